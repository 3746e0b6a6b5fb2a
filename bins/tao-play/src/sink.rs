//! 无界面输出: 视频帧写为 PAM 图像, 音频写为 s16le 原始 PCM.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tao_playback::{AudioFragment, VideoFrame};

/// 把 RGBA 帧逐个写入目录
pub struct FrameSink {
    dir: PathBuf,
    written: u64,
}

impl FrameSink {
    pub fn create(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("创建帧目录失败: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn write(&mut self, frame: &VideoFrame) -> anyhow::Result<PathBuf> {
        let path = self.dir.join(format!("frame_{:06}.pam", self.written));
        let file = File::create(&path).with_context(|| format!("创建 {} 失败", path.display()))?;
        let mut out = BufWriter::new(file);
        write_pam(&mut out, frame)?;
        out.flush()?;
        self.written += 1;
        Ok(path)
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

/// PAM (P7) RGB_ALPHA 图像
pub fn write_pam(out: &mut impl Write, frame: &VideoFrame) -> std::io::Result<()> {
    write!(
        out,
        "P7\nWIDTH {}\nHEIGHT {}\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n",
        frame.width, frame.height
    )?;
    out.write_all(&frame.data)
}

/// 按到达顺序拼接音频片段
pub struct PcmSink {
    out: BufWriter<File>,
    bytes: u64,
}

impl PcmSink {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path).with_context(|| format!("创建 {} 失败", path.display()))?;
        Ok(Self {
            out: BufWriter::new(file),
            bytes: 0,
        })
    }

    pub fn write(&mut self, fragment: &AudioFragment) -> anyhow::Result<()> {
        self.out.write_all(&fragment.data).context("写入 PCM 失败")?;
        self.bytes += fragment.size_bytes() as u64;
        Ok(())
    }

    pub fn finish(mut self) -> anyhow::Result<u64> {
        self.out.flush().context("写入 PCM 失败")?;
        Ok(self.bytes)
    }
}
