//! CRC 校验和计算.
//!
//! Ogg 页使用 CRC-32: 多项式 0x04C11DB7, 初始值 0, 不反射, 无最终异或.

/// CRC-32 查找表 (多项式 0x04C11DB7, 高位在前)
const OGG_CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i << 24;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ 0x04C1_1DB7;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

/// 在已有 CRC 值的基础上继续累加数据
///
/// 便于 Ogg 页头中的 CRC 字段按 0 参与计算而不必复制整页.
pub fn ogg_crc32_update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc = (crc << 8) ^ OGG_CRC32_TABLE[((crc >> 24) as u8 ^ byte) as usize];
    }
    crc
}

/// 计算 Ogg CRC-32
pub fn ogg_crc32(data: &[u8]) -> u32 {
    ogg_crc32_update(0, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ogg_crc32_空数据() {
        assert_eq!(ogg_crc32(&[]), 0);
    }

    #[test]
    fn test_ogg_crc32_标准校验值() {
        // CRC-32/CKSUM 去掉最终异或后的校验值
        assert_eq!(ogg_crc32(b"123456789"), 0x89A1_897F);
    }

    #[test]
    fn test_ogg_crc32_分段累加一致() {
        let data = b"OggS\x00\x02 some page payload";
        let whole = ogg_crc32(data);
        let (a, b) = data.split_at(7);
        assert_eq!(ogg_crc32_update(ogg_crc32(a), b), whole);
    }

    #[test]
    fn test_ogg_crc32_单字节() {
        assert_eq!(ogg_crc32(&[0x01]), 0x04C1_1DB7);
        assert_ne!(ogg_crc32(&[0x00, 0x01]), ogg_crc32(&[0x01, 0x00]));
    }
}
