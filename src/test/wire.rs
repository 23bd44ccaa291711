use super::mac;
use crate::frame::{EthernetFrame, MacAddr};
use crate::seq::SEQ_MODULUS;
use crate::wire::{
    Capacity, CodecError, ControlCode, ETHERTYPE_OUI_EXT, PROTO_TUNNEL_CTRL, TUNNEL_HDR_LEN,
    TUNNEL_MAGIC, TunnelControl, TunnelHeader, is_fragment, is_tunnel_control, oui_body,
    oui_payload,
};

#[test]
fn header_round_trips_every_sequence_number() {
    for seq in 0..SEQ_MODULUS {
        let bytes = TunnelHeader::encode(seq);
        let hdr = TunnelHeader::decode(&bytes).expect("decode");
        assert!(hdr.magic_valid);
        assert_eq!(hdr.seq, seq);
    }
}

#[test]
fn header_layout_is_magic_then_sequence() {
    let bytes = TunnelHeader::encode(1);
    let word = u32::from_be_bytes(bytes);
    assert_eq!(word >> 17, TUNNEL_MAGIC as u32);
    assert_eq!(word & 0x1ffff, 1);
    // 超出 17 位的序列号按模截断
    assert_eq!(TunnelHeader::decode(&TunnelHeader::encode(SEQ_MODULUS + 3)).expect("decode").seq, 3);
}

#[test]
fn header_decode_rejects_short_buffer_and_flags_bad_magic() {
    assert_eq!(
        TunnelHeader::decode(&[0x8e, 0x22]),
        Err(CodecError::TooShort {
            len: 2,
            need: TUNNEL_HDR_LEN
        })
    );
    let hdr = TunnelHeader::decode(&[0, 0, 0, 5]).expect("decode");
    assert!(!hdr.magic_valid);
    assert_eq!(hdr.seq, 5);
}

#[test]
fn control_round_trips_every_code() {
    let codes = [
        ControlCode::SetupAck,
        ControlCode::SetupReject,
        ControlCode::TerminateRequest,
        ControlCode::TerminateAck,
        ControlCode::EchoRequest,
        ControlCode::EchoReply,
    ];
    for code in codes {
        let ctrl = TunnelControl::new(code);
        let bytes = ctrl.encode();
        assert_eq!(bytes.len(), 1);
        assert_eq!(TunnelControl::decode(&bytes), Ok(ctrl));
    }
    for cap in [(0, 0), (1, u32::MAX), (100_000, 200_000)] {
        let ctrl = TunnelControl::setup_request(Capacity {
            from_client_to_server: cap.0,
            from_server_to_client: cap.1,
        });
        let bytes = ctrl.encode();
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], 1);
        assert_eq!(TunnelControl::decode(&bytes), Ok(ctrl));
    }
}

#[test]
fn setup_request_without_capacity_decodes_to_none() {
    let ctrl = TunnelControl::decode(&[1]).expect("decode");
    assert_eq!(ctrl.code, ControlCode::SetupRequest);
    assert_eq!(ctrl.capacity, None);
}

#[test]
fn truncated_capacity_and_empty_body_are_errors() {
    assert_eq!(
        TunnelControl::decode(&[1, 0, 0, 0]),
        Err(CodecError::TruncatedCapacity { len: 3 })
    );
    assert_eq!(
        TunnelControl::decode(&[]),
        Err(CodecError::TooShort { len: 0, need: 1 })
    );
}

#[test]
fn unknown_codes_decode_without_panicking() {
    for code in [0u8, 8, 0x7f, 0xff] {
        let ctrl = TunnelControl::decode(&[code, 1, 2, 3]).expect("decode");
        assert_eq!(ctrl.code, ControlCode::Unknown(code));
        assert_eq!(ctrl.code.as_u8(), code);
    }
}

#[test]
fn control_frame_is_an_oui_extension_frame() {
    let ctrl = TunnelControl::new(ControlCode::EchoReply);
    let frame = ctrl.to_frame(mac(2), mac(1));
    assert_eq!(frame.ether_type(), ETHERTYPE_OUI_EXT);
    assert_eq!(frame.destination(), mac(2));
    assert_eq!(frame.source(), mac(1));
    assert!(is_tunnel_control(&frame));
    assert!(!is_fragment(&frame));
    let (proto, body) = oui_body(&frame).expect("oui body");
    assert_eq!(proto, PROTO_TUNNEL_CTRL);
    assert_eq!(body, &[7]);
    assert_eq!(TunnelControl::from_frame(&frame), Ok(ctrl));
}

#[test]
fn data_frame_is_not_control() {
    let frame = EthernetFrame::new(MacAddr::BROADCAST, mac(1), 0x0800, &[1, 2, 3]);
    assert!(!is_tunnel_control(&frame));
    assert_eq!(TunnelControl::from_frame(&frame), Err(CodecError::NotControl));

    // 其它 OUI 的扩展帧也不是隧道控制帧
    let mut payload = oui_payload(PROTO_TUNNEL_CTRL, &[2]);
    payload[0] = 0x00;
    let foreign = EthernetFrame::new(mac(2), mac(1), ETHERTYPE_OUI_EXT, &payload);
    assert!(!is_tunnel_control(&foreign));
}
