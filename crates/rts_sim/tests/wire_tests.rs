//! Lockstep wire codec robustness and replay files.

use proptest::prelude::*;
use rts_sim::config::{LockstepScheduler, SimConfig};
use rts_sim::error::GameError;
use rts_sim::protocol::{decode_all, encode_all, CommandType, NetCommand, WireError, HEADER_LEN};
use rts_sim::replay::{Replay, ReplayPlayer};
use rts_sim::scenario::skirmish_1v1;
use rts_test_utils::determinism::strategies::{arb_command, arb_wire_bytes};

fn sample() -> NetCommand {
    NetCommand::new(42, 2, CommandType::PlaceBuilding, 0)
        .with_target(12, -3)
        .with_param("power_plant")
}

#[test]
fn test_record_layout_is_little_endian() {
    let bytes = sample().encode().expect("encode");
    assert_eq!(bytes.len(), HEADER_LEN + "power_plant".len());
    assert_eq!(&bytes[0..8], &42u64.to_le_bytes());
    assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
    assert_eq!(bytes[12], 4);
    assert_eq!(&bytes[13..21], &0u64.to_le_bytes());
    assert_eq!(&bytes[21..25], &12i32.to_le_bytes());
    assert_eq!(&bytes[25..29], &(-3i32).to_le_bytes());
    assert_eq!(&bytes[29..31], &11u16.to_le_bytes());
    assert_eq!(&bytes[31..], b"power_plant");
}

#[test]
fn test_every_truncation_is_an_error() {
    let bytes = sample().encode().expect("encode");
    for len in 0..bytes.len() {
        assert!(
            matches!(NetCommand::decode(&bytes[..len]), Err(WireError::Truncated { .. })),
            "prefix of {len} bytes decoded"
        );
    }
}

#[test]
fn test_unknown_command_type_is_rejected() {
    let mut bytes = sample().encode().expect("encode");
    bytes[12] = 200;
    assert_eq!(
        NetCommand::decode(&bytes),
        Err(WireError::UnknownCommandType(200))
    );
}

#[test]
fn test_replay_file_plays_back_identically() {
    let config = SimConfig::default();
    let scheduler = LockstepScheduler::from_config(&config);
    let mut replay = Replay::new();
    replay.record(scheduler.stamp(
        0,
        NetCommand::new(0, 1, CommandType::PlaceBuilding, 0)
            .with_target(10, 2)
            .with_param("barracks"),
    ));
    replay.record(scheduler.stamp(5, NetCommand::new(0, 2, CommandType::MoveUnit, 11).with_target(40, 5)));
    replay.record(scheduler.stamp(9, NetCommand::new(0, 1, CommandType::Chat, 0).with_param("gg")));
    assert_eq!(replay.last_tick(), Some(11));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("skirmish.replay");
    replay.save(&path).expect("save");
    let loaded = Replay::load(&path).expect("load");
    assert_eq!(loaded, replay);

    let world = skirmish_1v1(&config).expect("scenario");
    let mut first = ReplayPlayer::new(loaded.clone(), world, config.dt()).expect("player");
    first.seek(100).expect("seek");
    let hash = first.world().state_hash();

    let world = skirmish_1v1(&config).expect("scenario");
    let mut second = ReplayPlayer::new(loaded, world, config.dt()).expect("player");
    while second.advance() {}
    second.seek(100).expect("seek");
    second.verify(hash).expect("replays agree");

    let mut direct = skirmish_1v1(&config).expect("scenario");
    for command in replay.commands() {
        direct.schedule(command.clone());
    }
    for _ in 0..100 {
        direct.tick(config.dt());
    }
    assert_eq!(direct.state_hash(), hash);
}

#[test]
fn test_corrupt_replay_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.replay");
    let mut bytes = sample().encode().expect("encode");
    bytes.pop();
    std::fs::write(&path, bytes).expect("write");
    assert!(matches!(Replay::load(&path), Err(GameError::Wire(_))));
}

proptest! {
    #[test]
    fn prop_decoding_arbitrary_bytes_never_panics(bytes in arb_wire_bytes(96)) {
        if let Ok((command, used)) = NetCommand::decode(&bytes) {
            prop_assert!(used <= bytes.len());
            prop_assert_eq!(command.encode().expect("re-encode"), bytes[..used].to_vec());
        }
        let _ = decode_all(&bytes);
    }

    #[test]
    fn prop_streams_decode_to_the_same_commands(
        commands in proptest::collection::vec(arb_command(7, vec![1, 2, 3], 64, 64, 64), 0..12)
    ) {
        let bytes = encode_all(&commands).expect("encode");
        prop_assert_eq!(decode_all(&bytes).expect("decode"), commands.clone());
        if !bytes.is_empty() {
            prop_assert!(decode_all(&bytes[..bytes.len() - 1]).is_err());
        }
    }
}
