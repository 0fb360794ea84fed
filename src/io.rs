//! Raw planar video I/O
//!
//! Headerless 8-bit planar video: each frame is the Y plane followed by the U
//! and V planes, rows packed without padding. A [`SampleRange`] maps samples
//! to `f32` on read; writes round and clamp back to `0..=255`.

use crate::error::{Error, Result};
use crate::plane::OwnedPlane;
use crate::types::{Frame, SampleRange, VideoInfo};
use std::io::{ErrorKind, Read, Write};

/// Bytes in one raw frame of `info`
pub fn frame_size(info: &VideoInfo) -> usize {
    (0..info.format.plane_count())
        .map(|i| info.plane_resolution(i).pixels() as usize)
        .sum()
}

/// Reads raw frames of a fixed geometry
pub struct RawFrameReader<R: Read> {
    reader: R,
    info: VideoInfo,
    range: SampleRange,
    buf: Vec<u8>,
    next_index: u64,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(reader: R, info: VideoInfo) -> Self {
        Self {
            reader,
            info,
            range: SampleRange::Full,
            buf: vec![0; frame_size(&info)],
            next_index: 0,
        }
    }

    pub fn with_range(mut self, range: SampleRange) -> Self {
        self.range = range;
        self
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }

    /// Fill the frame buffer; returns the number of bytes read
    fn fill(&mut self) -> Result<usize> {
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Read the next frame; `Ok(None)` at a clean end of stream
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let filled = self.fill()?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < self.buf.len() {
            return Err(Error::InvalidInput(format!(
                "truncated frame {}: {} of {} bytes",
                self.next_index,
                filled,
                self.buf.len()
            )));
        }

        let mut offset = 0;
        let mut planes = Vec::with_capacity(self.info.format.plane_count());
        for i in 0..self.info.format.plane_count() {
            let res = self.info.plane_resolution(i);
            let len = res.pixels() as usize;
            let chroma = i > 0;
            let data = self.buf[offset..offset + len]
                .iter()
                .map(|&v| self.range.normalize(v, chroma))
                .collect();
            planes.push(OwnedPlane::from_vec(data, res.width as usize, res.height as usize)?);
            offset += len;
        }

        let frame = Frame::from_planes(self.info.resolution, self.info.format, planes)?
            .with_index(self.next_index);
        self.next_index += 1;
        Ok(Some(frame))
    }
}

impl<R: Read> Iterator for RawFrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

/// Writes raw frames
pub struct RawFrameWriter<W: Write> {
    writer: W,
    range: SampleRange,
    buf: Vec<u8>,
    frames_written: u64,
}

impl<W: Write> RawFrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            range: SampleRange::Full,
            buf: Vec::new(),
            frames_written: 0,
        }
    }

    pub fn with_range(mut self, range: SampleRange) -> Self {
        self.range = range;
        self
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        for (i, plane) in frame.planes.iter().enumerate() {
            let chroma = i > 0;
            self.buf
                .extend(plane.data().iter().map(|&v| self.range.quantize(v, chroma)));
        }
        self.writer.write_all(&self.buf)?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PixelFormat, Resolution};
    use std::io::Cursor;

    fn info() -> VideoInfo {
        VideoInfo::new(Resolution::new(4, 2), PixelFormat::Yuv420p)
    }

    #[test]
    fn test_frame_size() {
        assert_eq!(frame_size(&info()), 8 + 2 + 2);
        let gray = VideoInfo::new(Resolution::new(5, 3), PixelFormat::Gray);
        assert_eq!(frame_size(&gray), 15);
    }

    #[test]
    fn test_read_frames_then_eof() {
        let bytes: Vec<u8> = (0..24).map(|v| v * 10).collect();
        let mut reader = RawFrameReader::new(Cursor::new(bytes), info());

        let first = reader.read_frame().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.planes[0].data()[1], 10.0 / 255.0);
        assert_eq!(first.planes[1].data(), &[80.0 / 255.0, 90.0 / 255.0]);

        let second = reader.read_frame().unwrap().unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.planes[2].data()[1], 230.0 / 255.0);

        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_truncated_frame() {
        let reader = RawFrameReader::new(Cursor::new(vec![0u8; 12 + 5]), info());
        let results: Vec<_> = reader.collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_write_rounds_and_clamps() {
        let mut frame = Frame::new(Resolution::new(2, 2), PixelFormat::Yuv420p);
        frame.planes[0]
            .data_mut()
            .copy_from_slice(&[-0.5, 0.5, 1.5, 100.4 / 255.0]);
        frame.planes[1].data_mut()[0] = f32::NAN;
        frame.planes[2].data_mut()[0] = 1.0;

        let mut writer = RawFrameWriter::new(Vec::new());
        writer.write_frame(&frame).unwrap();
        assert_eq!(writer.frames_written(), 1);
        assert_eq!(writer.into_inner(), vec![0, 128, 255, 100, 0, 255]);
    }

    #[test]
    fn test_limited_range_read() {
        let bytes = vec![16, 235, 126, 16, 128, 240, 240, 128, 240, 128, 128, 128];
        let mut reader =
            RawFrameReader::new(Cursor::new(bytes), info()).with_range(SampleRange::Limited);
        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(&frame.planes[0].data()[..2], &[0.0, 1.0]);
        assert_eq!(frame.planes[1].data(), &[1.0, 0.5]);
        assert_eq!(frame.planes[2].data(), &[0.5, 0.5]);
    }

    #[test]
    fn test_limited_range_write() {
        let mut frame = Frame::new(Resolution::new(2, 2), PixelFormat::Yuv420p);
        frame.planes[0].data_mut().copy_from_slice(&[0.0, 1.0, 0.5, -0.2]);
        frame.planes[1].data_mut()[0] = 0.5;
        frame.planes[2].data_mut()[0] = 1.0;

        let mut writer = RawFrameWriter::new(Vec::new()).with_range(SampleRange::Limited);
        writer.write_frame(&frame).unwrap();
        // 0.5 * 219 + 16 = 125.5 rounds away from zero
        assert_eq!(writer.into_inner(), vec![16, 235, 126, 0, 128, 240]);
    }

    #[test]
    fn test_bytes_survive_read_write() {
        let bytes: Vec<u8> = (0..12).map(|v| v * 21).collect();
        let mut reader = RawFrameReader::new(Cursor::new(bytes.clone()), info());
        let frame = reader.read_frame().unwrap().unwrap();
        let mut writer = RawFrameWriter::new(Vec::new());
        writer.write_frame(&frame).unwrap();
        assert_eq!(writer.into_inner(), bytes);
    }

    #[test]
    fn test_every_code_survives_limited_round_trip() {
        let gray = VideoInfo::new(Resolution::new(16, 16), PixelFormat::Gray);
        let bytes: Vec<u8> = (0..=255).collect();
        let mut reader =
            RawFrameReader::new(Cursor::new(bytes.clone()), gray).with_range(SampleRange::Limited);
        let frame = reader.read_frame().unwrap().unwrap();
        let mut writer = RawFrameWriter::new(Vec::new()).with_range(SampleRange::Limited);
        writer.write_frame(&frame).unwrap();
        assert_eq!(writer.into_inner(), bytes);
    }
}
