//! Mid-session rekey tests (§4.1 rekey, §3 `KeyContext`).
//!
//! A session that crosses its outbound byte budget must renegotiate keys
//! transparently: frames sent immediately before, during, and after the
//! `RekeyRequest`/`RekeyAck` exchange all still have to decrypt correctly
//! on the other end.

use a12_core::{handshake::ForwardSecrecyMode, session::SessionConfig};
use a12_harness::SessionPair;
use a12_proto::{FrameType, PlaintextFrame, VideoPriority};

fn small_rekey_config() -> SessionConfig {
    SessionConfig { rekey_bytes_limit: 256, ..SessionConfig::default() }
}

#[test]
fn rekey_triggers_once_byte_budget_is_crossed() {
    let mut pair = SessionPair::new_with_config(21, ForwardSecrecyMode::Disabled, small_rekey_config());

    let payload = vec![0u8; 64];
    for _ in 0..10 {
        let frame = PlaintextFrame::new(FrameType::Event, 0, payload.clone());
        pair.send_and_verify(frame, VideoPriority::Normal, false).expect("frame delivered before rekey");
    }

    pair.tick_both();

    assert!(pair.a.is_authenticated());
    assert!(pair.b.is_authenticated());
}

#[test]
fn frames_keep_decrypting_across_a_rekey() {
    let mut pair = SessionPair::new_with_config(22, ForwardSecrecyMode::Disabled, small_rekey_config());

    let payload = vec![1u8; 64];
    for _ in 0..20 {
        let frame = PlaintextFrame::new(FrameType::Event, 0, payload.clone());
        pair.send_and_verify(frame, VideoPriority::Normal, false).expect("frame delivered across rekey boundary");
        pair.tick_both();
    }
}

#[test]
fn rekey_does_not_disturb_forward_secrecy_sessions() {
    let mut pair = SessionPair::new_with_config(23, ForwardSecrecyMode::Enabled, small_rekey_config());

    let payload = vec![2u8; 64];
    for _ in 0..20 {
        let frame = PlaintextFrame::new(FrameType::Event, 0, payload.clone());
        pair.send_and_verify(frame, VideoPriority::Normal, true).expect("frame delivered across rekey boundary");
        pair.tick_both();
    }
}
