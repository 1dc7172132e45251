//! Balise telegram: 50-bit header followed by packets up to packet 255.

use crate::bits::{BitReader, BitString, BitWriter};
use crate::error::DecodeError;
use crate::position::Orientation;

use super::{Packet, END_OF_INFORMATION, INFILL_LOCATION_REFERENCE};

/// Width of the telegram header.
pub const HEADER_BITS: usize = 50;

/// Identity of a balise group: country or region plus group number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaliseGroupId {
    /// `NID_C`, 10 bits.
    pub nid_c: u16,
    /// `NID_BG`, 14 bits.
    pub nid_bg: u16,
}

impl BaliseGroupId {
    /// Group `nid_bg` in country `nid_c`.
    pub const fn new(nid_c: u16, nid_bg: u16) -> Self {
        Self { nid_c, nid_bg }
    }
}

/// Telegram header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TelegramHeader {
    /// `Q_UPDOWN`: telegram is track to train.
    pub q_updown: bool,
    /// `M_VERSION`: ETCS system version of the trackside.
    pub m_version: u8,
    /// `Q_MEDIA`: false for a balise, true for a loop.
    pub q_media: bool,
    /// `N_PIG`: position of the balise in its group.
    pub n_pig: u8,
    /// `N_TOTAL`: number of balises in the group, minus one.
    pub n_total: u8,
    /// `M_DUP`: duplication marker.
    pub m_dup: u8,
    /// `M_MCOUNT`: message counter.
    pub m_mcount: u8,
    /// Balise group identity (`NID_C`, `NID_BG`).
    pub group: BaliseGroupId,
    /// `Q_LINK`: the group is linked.
    pub q_link: bool,
}

impl TelegramHeader {
    /// Decode the header.
    pub fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            q_updown: reader.read_flag("Q_UPDOWN")?,
            m_version: reader.read("M_VERSION", 7)? as u8,
            q_media: reader.read_flag("Q_MEDIA")?,
            n_pig: reader.read("N_PIG", 3)? as u8,
            n_total: reader.read("N_TOTAL", 3)? as u8,
            m_dup: reader.read("M_DUP", 2)? as u8,
            m_mcount: reader.read("M_MCOUNT", 8)? as u8,
            group: BaliseGroupId {
                nid_c: reader.read("NID_C", 10)? as u16,
                nid_bg: reader.read("NID_BG", 14)? as u16,
            },
            q_link: reader.read_flag("Q_LINK")?,
        })
    }

    /// Encode the header.
    pub fn write(&self, writer: &mut BitWriter) {
        writer
            .write_flag(self.q_updown)
            .write(u64::from(self.m_version), 7)
            .write_flag(self.q_media)
            .write(u64::from(self.n_pig), 3)
            .write(u64::from(self.n_total), 3)
            .write(u64::from(self.m_dup), 2)
            .write(u64::from(self.m_mcount), 8)
            .write(u64::from(self.group.nid_c), 10)
            .write(u64::from(self.group.nid_bg), 14)
            .write_flag(self.q_link);
    }
}

/// A decoded telegram.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Telegram {
    /// Header.
    pub header: TelegramHeader,
    /// Packets in wire order, without the end marker.
    pub packets: Vec<Packet>,
}

impl Telegram {
    /// A telegram with the given header and no packets.
    pub fn new(header: TelegramHeader) -> Self {
        Self {
            header,
            packets: Vec::new(),
        }
    }

    /// Append a packet.
    pub fn with_packet(mut self, packet: Packet) -> Self {
        self.packets.push(packet);
        self
    }

    /// Decode a complete telegram.
    ///
    /// Packets are read until packet 255 or until fewer than eight bits
    /// remain, which covers the zero fill at the end of a balise telegram.
    pub fn decode(bits: &BitString) -> Result<Self, DecodeError> {
        let mut reader = bits.reader();
        let header = TelegramHeader::decode(&mut reader)?;
        let mut packets = Vec::new();
        while reader.remaining() >= 8 {
            match Packet::decode(&mut reader)? {
                Some(packet) => packets.push(packet),
                None => break,
            }
        }
        Ok(Self { header, packets })
    }

    /// Encode with the end-of-information marker.
    pub fn to_bits(&self) -> BitString {
        let mut writer = BitWriter::new();
        self.header.write(&mut writer);
        for packet in &self.packets {
            packet.write(&mut writer);
        }
        writer.write(u64::from(END_OF_INFORMATION), 8);
        writer.finish()
    }

    /// Originating balise group.
    pub fn balise_group(&self) -> BaliseGroupId {
        self.header.group
    }

    /// Packets that apply to a train passing the group in direction `passed`,
    /// each with its infill flag. Packets after an infill location reference
    /// are infill; the reference packet itself is not returned.
    pub fn applicable_packets(
        &self,
        passed: Orientation,
    ) -> impl Iterator<Item = (&Packet, bool)> + '_ {
        let mut infill = false;
        self.packets.iter().filter_map(move |packet| {
            if packet.nid_packet() == INFILL_LOCATION_REFERENCE {
                infill = true;
                return None;
            }
            packet.q_dir().applies_to(passed).then_some((packet, infill))
        })
    }
}
