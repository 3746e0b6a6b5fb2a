//! 解码器 trait 定义.

use tao_core::TaoResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::Frame;
use crate::packet::Packet;

/// 解码器 trait
///
/// Ogg 承载的编解码器把配置放在前 3 个头包中, 因此没有单独的 open 步骤:
/// 1. 依次 `send_packet()` 送入 3 个头包, `headers_ready()` 变为 true
/// 2. 之后每个数据包调用 `send_packet()`, 再用 `receive_frame()` 取出结果
/// 3. `flush()` 丢弃跨包状态 (参考帧、重叠缓冲), 保留头包配置
pub trait Decoder: Send {
    /// 获取解码器标识
    fn codec_id(&self) -> CodecId;

    /// 获取解码器名称
    fn name(&self) -> &str;

    /// 3 个头包是否均已解析
    fn headers_ready(&self) -> bool;

    /// 头包解析完成后的流参数
    fn parameters(&self) -> Option<CodecParameters>;

    /// 粒度位置换算为秒
    ///
    /// 视频返回该帧的显示结束时间, 音频返回采样位置对应的时间.
    fn granule_time(&self, granule: i64) -> Option<f64>;

    /// 送入一个头包或数据包
    ///
    /// # 返回
    /// - `Ok(())`: 数据包已接受
    /// - `Err(TaoError::InvalidData)`: 头包或数据包损坏
    /// - `Err(TaoError::InvalidArgument)`: 调用顺序错误
    fn send_packet(&mut self, packet: &Packet) -> TaoResult<()>;

    /// 取出解码结果
    ///
    /// # 返回
    /// - `Ok(frame)`: 成功取出一帧
    /// - `Err(TaoError::NeedMoreData)`: 需要送入更多数据包
    fn receive_frame(&mut self) -> TaoResult<Frame>;

    /// 刷新解码器, 清空跨包状态
    fn flush(&mut self);

    /// 支持的最高后处理级别, 0 表示不支持
    fn postprocess_level_max(&self) -> u8 {
        0
    }

    /// 设置后处理级别, 超过上限时取上限
    fn set_postprocess_level(&mut self, _level: u8) {}
}
