//! Lockstep command wire format.
//!
//! Every command is one fixed-order little-endian record:
//!
//! | field          | type            |
//! |----------------|-----------------|
//! | `tick`         | `u64`           |
//! | `player_id`    | `i32`           |
//! | `command_type` | `u8`            |
//! | `entity_id`    | `u64`           |
//! | `target_x`     | `i32`           |
//! | `target_y`     | `i32`           |
//! | `param_len`    | `u16`           |
//! | `param`        | `[u8; param_len]` |
//!
//! Records are self-delimiting, so a stream is just records back to back.
//! Decoding never truncates silently: any short read is an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::EntityId;
use crate::players::PlayerId;

/// Bytes in a record before the parameter payload.
pub const HEADER_LEN: usize = 8 + 4 + 1 + 8 + 4 + 4 + 2;

/// Errors from encoding or decoding wire records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Input ended inside a record.
    #[error("Truncated command record: needed {needed} bytes for {field}, {available} available")]
    Truncated {
        /// Field being read.
        field: &'static str,
        /// Bytes required.
        needed: usize,
        /// Bytes left.
        available: usize,
    },

    /// Command type byte outside the known range.
    #[error("Unknown command type: {0}")]
    UnknownCommandType(u8),

    /// Parameter does not fit the `u16` length prefix.
    #[error("Command parameter too long: {0} bytes")]
    ParamTooLong(usize),
}

/// Kind of a lockstep command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandType {
    /// Move a unit to the target tile.
    MoveUnit = 0,
    /// Attack the entity packed into the target fields.
    AttackUnit = 1,
    /// Stop moving and clear orders.
    StopUnit = 2,
    /// Queue the unit named in `param` at a production building.
    BuildUnit = 3,
    /// Place the building named in `param` at the target tile.
    PlaceBuilding = 4,
    /// Sell a building.
    SellBuilding = 5,
    /// Set a production building's rally tile.
    SetRally = 6,
    /// Chat text in `param`.
    Chat = 7,
    /// Deploy an MCV into a construction yard.
    DeployMcv = 8,
}

impl TryFrom<u8> for CommandType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::MoveUnit,
            1 => Self::AttackUnit,
            2 => Self::StopUnit,
            3 => Self::BuildUnit,
            4 => Self::PlaceBuilding,
            5 => Self::SellBuilding,
            6 => Self::SetRally,
            7 => Self::Chat,
            8 => Self::DeployMcv,
            other => return Err(WireError::UnknownCommandType(other)),
        })
    }
}

/// One player command scheduled for a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetCommand {
    /// Tick the command applies at.
    pub tick: u64,
    /// Issuing player.
    pub player_id: PlayerId,
    /// Command kind.
    pub command_type: CommandType,
    /// Subject entity, zero when unused.
    pub entity_id: EntityId,
    /// Target column, or low half of a target entity id.
    pub target_x: i32,
    /// Target row.
    pub target_y: i32,
    /// Free-form payload: unit key, building key or chat text.
    pub param: Vec<u8>,
}

impl NetCommand {
    /// Command with no target and no payload.
    #[must_use]
    pub fn new(tick: u64, player_id: PlayerId, command_type: CommandType, entity_id: EntityId) -> Self {
        Self {
            tick,
            player_id,
            command_type,
            entity_id,
            target_x: 0,
            target_y: 0,
            param: Vec::new(),
        }
    }

    /// Builder: target tile.
    #[must_use]
    pub fn with_target(mut self, x: i32, y: i32) -> Self {
        self.target_x = x;
        self.target_y = y;
        self
    }

    /// Builder: text payload.
    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into().into_bytes();
        self
    }

    /// Target entity id for [`CommandType::AttackUnit`], carried as the two
    /// target halves.
    #[must_use]
    pub fn target_entity(&self) -> EntityId {
        (u64::from(self.target_y as u32) << 32) | u64::from(self.target_x as u32)
    }

    /// Builder: target entity for [`CommandType::AttackUnit`].
    #[must_use]
    pub fn with_target_entity(mut self, entity: EntityId) -> Self {
        self.target_x = entity as u32 as i32;
        self.target_y = (entity >> 32) as u32 as i32;
        self
    }

    /// Payload as UTF-8.
    pub fn param_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.param)
    }

    /// Size of the encoded record.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.param.len()
    }

    /// Append the record to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let param_len =
            u16::try_from(self.param.len()).map_err(|_| WireError::ParamTooLong(self.param.len()))?;
        out.reserve(self.encoded_len());
        out.extend_from_slice(&self.tick.to_le_bytes());
        out.extend_from_slice(&self.player_id.to_le_bytes());
        out.push(self.command_type as u8);
        out.extend_from_slice(&self.entity_id.to_le_bytes());
        out.extend_from_slice(&self.target_x.to_le_bytes());
        out.extend_from_slice(&self.target_y.to_le_bytes());
        out.extend_from_slice(&param_len.to_le_bytes());
        out.extend_from_slice(&self.param);
        Ok(())
    }

    /// Encode to a fresh buffer.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Decode one record from the front of `bytes`, returning it with the
    /// number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), WireError> {
        let mut reader = Reader::new(bytes);
        let tick = u64::from_le_bytes(reader.array("tick")?);
        let player_id = i32::from_le_bytes(reader.array("player_id")?);
        let [raw_type] = reader.array::<1>("command_type")?;
        let command_type = CommandType::try_from(raw_type)?;
        let entity_id = u64::from_le_bytes(reader.array("entity_id")?);
        let target_x = i32::from_le_bytes(reader.array("target_x")?);
        let target_y = i32::from_le_bytes(reader.array("target_y")?);
        let param_len = u16::from_le_bytes(reader.array("param_len")?);
        let param = reader.take(usize::from(param_len), "param")?.to_vec();

        let command = Self {
            tick,
            player_id,
            command_type,
            entity_id,
            target_x,
            target_y,
            param,
        };
        Ok((command, reader.position))
    }
}

/// Encode a sequence of records back to back.
pub fn encode_all(commands: &[NetCommand]) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::with_capacity(commands.iter().map(NetCommand::encoded_len).sum());
    for command in commands {
        command.encode_into(&mut out)?;
    }
    Ok(out)
}

/// Decode a buffer of back-to-back records. Fails on any partial record.
pub fn decode_all(mut bytes: &[u8]) -> Result<Vec<NetCommand>, WireError> {
    let mut commands = Vec::new();
    while !bytes.is_empty() {
        let (command, used) = NetCommand::decode(bytes)?;
        commands.push(command);
        bytes = &bytes[used..];
    }
    Ok(commands)
}

struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], WireError> {
        let available = self.bytes.len() - self.position;
        if available < len {
            return Err(WireError::Truncated {
                field,
                needed: len,
                available,
            });
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }
}
