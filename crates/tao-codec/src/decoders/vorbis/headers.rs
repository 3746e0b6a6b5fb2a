//! Vorbis identification / comment 头包.

use tao_core::{TaoError, TaoResult};

/// identification 头包内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VorbisInfo {
    /// 声道数
    pub channels: u8,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 最大码率, 0 或负值表示未设置
    pub bitrate_maximum: i32,
    /// 标称码率
    pub bitrate_nominal: i32,
    /// 最小码率
    pub bitrate_minimum: i32,
    /// 短块长度
    pub blocksize0: u16,
    /// 长块长度
    pub blocksize1: u16,
}

/// comment 头包内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VorbisComment {
    /// 编码器标识
    pub vendor: String,
    /// 用户注释 ("KEY=value")
    pub user_comments: Vec<String>,
}

/// 头包类型字节的最低位为 1, 数据包为 0
pub(crate) fn is_header_packet(packet: &[u8]) -> bool {
    packet.first().is_some_and(|&b| b & 0x01 != 0)
}

fn check_magic(packet: &[u8], kind: u8, what: &str) -> TaoResult<()> {
    if packet.len() < 7 || packet[0] != kind || &packet[1..7] != b"vorbis" {
        return Err(TaoError::InvalidData(format!(
            "Vorbis {} 头包标识无效",
            what
        )));
    }
    Ok(())
}

/// 解析 identification 头包
///
/// 同时用于流探测: 只要本函数成功, 该逻辑流即视为 Vorbis.
pub fn parse_identification(packet: &[u8]) -> TaoResult<VorbisInfo> {
    check_magic(packet, 0x01, "identification")?;
    if packet.len() < 30 {
        return Err(TaoError::InvalidData(format!(
            "Vorbis identification 头包长度不足: {}",
            packet.len(),
        )));
    }

    let mut pos = 7usize;
    let version = read_le_u32(packet, &mut pos)?;
    if version != 0 {
        return Err(TaoError::Unsupported(format!(
            "Vorbis 版本不支持: {}",
            version,
        )));
    }

    let channels = packet[11];
    pos = 12;
    let sample_rate = read_le_u32(packet, &mut pos)?;
    let bitrate_maximum = read_le_u32(packet, &mut pos)? as i32;
    let bitrate_nominal = read_le_u32(packet, &mut pos)? as i32;
    let bitrate_minimum = read_le_u32(packet, &mut pos)? as i32;
    if channels == 0 {
        return Err(TaoError::InvalidData("Vorbis 声道数不能为 0".into()));
    }
    if sample_rate == 0 {
        return Err(TaoError::InvalidData("Vorbis 采样率不能为 0".into()));
    }

    let bs = packet[28];
    let bs0_exp = bs & 0x0F;
    let bs1_exp = bs >> 4;
    if !(6..=13).contains(&bs0_exp) || !(6..=13).contains(&bs1_exp) || bs0_exp > bs1_exp {
        return Err(TaoError::InvalidData(format!(
            "Vorbis blocksize 非法: bs0_exp={}, bs1_exp={}",
            bs0_exp, bs1_exp,
        )));
    }

    if packet[29] & 0x01 == 0 {
        return Err(TaoError::InvalidData(
            "Vorbis identification 头包 framing_flag 非法".into(),
        ));
    }

    Ok(VorbisInfo {
        channels,
        sample_rate,
        bitrate_maximum,
        bitrate_nominal,
        bitrate_minimum,
        blocksize0: 1 << bs0_exp,
        blocksize1: 1 << bs1_exp,
    })
}

/// 解析 comment 头包
pub fn parse_comment(packet: &[u8]) -> TaoResult<VorbisComment> {
    check_magic(packet, 0x03, "comment")?;

    let mut pos = 7usize;
    let vendor_len = read_le_u32(packet, &mut pos)? as usize;
    let vendor = read_string(packet, &mut pos, vendor_len)?;

    let count = read_le_u32(packet, &mut pos)? as usize;
    let mut user_comments = Vec::with_capacity(count.min(256));
    for _ in 0..count {
        let len = read_le_u32(packet, &mut pos)? as usize;
        user_comments.push(read_string(packet, &mut pos, len)?);
    }

    match packet.get(pos) {
        Some(b) if b & 0x01 != 0 => Ok(VorbisComment {
            vendor,
            user_comments,
        }),
        _ => Err(TaoError::InvalidData(
            "Vorbis comment 头包 framing_flag 非法".into(),
        )),
    }
}

fn read_le_u32(data: &[u8], pos: &mut usize) -> TaoResult<u32> {
    let bytes = data
        .get(*pos..*pos + 4)
        .ok_or_else(|| TaoError::InvalidData("Vorbis 头包长度字段越界".into()))?;
    *pos += 4;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_string(data: &[u8], pos: &mut usize, len: usize) -> TaoResult<String> {
    let end = pos.saturating_add(len);
    let bytes = data.get(*pos..end).ok_or_else(|| {
        TaoError::InvalidData(format!(
            "Vorbis comment 字符串越界: pos={}, len={}, total={}",
            *pos,
            len,
            data.len()
        ))
    })?;
    *pos = end;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ident_header(channels: u8, blocksizes: u8) -> Vec<u8> {
        let mut v = vec![0x01];
        v.extend_from_slice(b"vorbis");
        v.extend_from_slice(&0u32.to_le_bytes());
        v.push(channels);
        v.extend_from_slice(&44100u32.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.extend_from_slice(&128000i32.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.push(blocksizes);
        v.push(1);
        v
    }

    #[test]
    fn test_解析_identification() {
        let info = parse_identification(&build_ident_header(2, (11 << 4) | 8)).unwrap();
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.bitrate_nominal, 128000);
        assert_eq!(info.blocksize0, 256);
        assert_eq!(info.blocksize1, 2048);
    }

    #[test]
    fn test_identification_非法字段() {
        assert!(parse_identification(&build_ident_header(0, (11 << 4) | 8)).is_err());
        // 短块大于长块
        assert!(parse_identification(&build_ident_header(2, (8 << 4) | 11)).is_err());
        // 指数超出 6..=13
        assert!(parse_identification(&build_ident_header(2, (14 << 4) | 8)).is_err());
        let mut no_framing = build_ident_header(2, (11 << 4) | 8);
        no_framing[29] = 0;
        assert!(parse_identification(&no_framing).is_err());
        let mut short = build_ident_header(2, (11 << 4) | 8);
        short.truncate(20);
        assert!(parse_identification(&short).is_err());
        // Theora 头包不会被识别为 Vorbis
        assert!(parse_identification(b"\x80theora").is_err());
    }

    #[test]
    fn test_解析_comment() {
        let mut v = vec![0x03];
        v.extend_from_slice(b"vorbis");
        v.extend_from_slice(&3u32.to_le_bytes());
        v.extend_from_slice(b"tao");
        v.extend_from_slice(&1u32.to_le_bytes());
        v.extend_from_slice(&9u32.to_le_bytes());
        v.extend_from_slice(b"TITLE=abc");
        v.push(1);
        let c = parse_comment(&v).unwrap();
        assert_eq!(c.vendor, "tao");
        assert_eq!(c.user_comments, vec!["TITLE=abc".to_string()]);

        v.pop();
        assert!(parse_comment(&v).is_err());
    }

    #[test]
    fn test_头包类型判断() {
        assert!(is_header_packet(&[0x05]));
        assert!(!is_header_packet(&[0x00]));
        assert!(!is_header_packet(&[]));
    }
}
