//! 像素转换集成测试: 解码器输出的平面经 tao-scale 转为 RGBA.

mod common;

use tao_ogv::codec::{CodecId, Frame, Packet};
use tao_ogv::scale::{YuvPlanes, yuv_to_rgba, yuv420p_to_rgba};

use common::{theora_comment, theora_ident, theora_intra_frame, theora_setup};

#[test]
fn test_白与黑() {
    assert_eq!(yuv_to_rgba(255, 128, 128), [255, 255, 255, 255]);
    assert_eq!(yuv_to_rgba(0, 128, 128), [0, 0, 0, 255]);

    let y = [255u8, 255, 0, 0];
    let uv = [128u8];
    let rgba = yuv420p_to_rgba(&YuvPlanes::packed(&y, &uv, &uv, 2, 2)).unwrap();
    assert_eq!(&rgba[..8], &[255, 255, 255, 255, 255, 255, 255, 255]);
    assert_eq!(&rgba[8..], &[0, 0, 0, 255, 0, 0, 0, 255]);
}

#[test]
fn test_解码帧转换() {
    let mut dec = tao_ogv::default_codec_registry()
        .create_decoder(CodecId::Theora)
        .unwrap();
    for pkt in [theora_ident((10, 1), 0), theora_comment(), theora_setup()] {
        dec.send_packet(&Packet::from_data(pkt)).unwrap();
    }
    dec.send_packet(&Packet::from_data(theora_intra_frame())).unwrap();
    let Frame::Video(frame) = dec.receive_frame().unwrap() else {
        panic!("期望视频帧");
    };
    let planes = YuvPlanes {
        y: &frame.data[0],
        u: &frame.data[1],
        v: &frame.data[2],
        strides: [frame.linesize[0], frame.linesize[1], frame.linesize[2]],
        width: frame.width,
        height: frame.height,
    };
    let rgba = yuv420p_to_rgba(&planes).unwrap();
    assert_eq!(rgba.len(), 16 * 16 * 4);
    let expected = yuv_to_rgba(134, 134, 134);
    assert!(rgba.chunks_exact(4).all(|px| px == expected));
}
