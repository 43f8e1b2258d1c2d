//! Animation ingest: `soPF` property frames and `FPos` position frames.
//!
//! Only the on-disk payloads and the data they populate live here. Playback
//! (scene clock advancement and live interpolation) belongs to the caller.

use crate::reader::Reader;
use crate::Error;

/// A `soPF` payload. The property data is stored verbatim.
#[derive(Clone, Debug)]
pub struct PropertyFrame {
    pub shape_id: u32,
    pub property_count: u32,
    pub time_stamp: f32,
    pub data: Vec<u8>,
}

/// An `FPos` payload.
#[derive(Clone, Debug)]
pub struct PositionFrame {
    pub frame_count: u32,
    pub start_time: f32,
    pub end_time: f32,
    pub positions: Vec<f32>,
}

#[derive(Copy, Clone, Debug)]
pub struct AnimationBatch {
    pub batch_id: u32,
    pub current_time: f32,
    pub target_time: f32,
    pub keyframe_count: u32,
    /// Start of this batch's window in the shared keyframe pool.
    pub keyframe_offset: u32,
    /// `batch_id` of a linked child batch; 0 means none.
    pub child_batch: u32,
    pub render_data: u32,
    pub is_active: bool,
    pub requires_update: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct Keyframe {
    pub time: f32,
    pub batch_id: u32,
}

/// Result of [`AnimationData::interpolate_batch_keyframe`].
#[derive(Copy, Clone, Debug)]
pub struct BatchInterpolation {
    pub from: u32,
    pub to: u32,
    pub factor: f32,
    pub is_static: bool,
}

#[derive(Clone, Debug, Default)]
pub struct AnimationData {
    pub properties: Vec<PropertyFrame>,
    pub positions: Vec<PositionFrame>,
    pub batches: Vec<AnimationBatch>,
    pub keyframes: Vec<Keyframe>,
    pub global_time: f32,
}

impl AnimationData {
    /// Total number of stored position frames across all `FPos` chunks.
    pub fn frame_count(&self) -> usize {
        self.positions.iter().map(|p| p.positions.len()).sum()
    }

    pub(crate) fn ingest_property_frame(&mut self, data: &[u8]) -> Result<(), Error> {
        let mut r = Reader::new(data);

        let shape_id = r.u32_le().map_err(|_| Error::InvalidDynamicData)?;
        let property_count = r.u32_le().map_err(|_| Error::InvalidDynamicData)?;
        let time_stamp = r.f32_le().map_err(|_| Error::InvalidDynamicData)?;
        let data_size = r.u32_le().map_err(|_| Error::InvalidDynamicData)? as usize;

        let payload = r.take(data_size).map_err(|_| Error::InvalidDynamicData)?;

        self.properties.push(PropertyFrame {
            shape_id,
            property_count,
            time_stamp,
            data: payload.to_vec(),
        });
        Ok(())
    }

    pub(crate) fn ingest_position_frame(&mut self, data: &[u8]) -> Result<(), Error> {
        let mut r = Reader::new(data);

        let frame_count = r.u32_le().map_err(|_| Error::InvalidAnimation)?;
        let start_time = r.f32_le().map_err(|_| Error::InvalidAnimation)?;
        let end_time = r.f32_le().map_err(|_| Error::InvalidAnimation)?;
        let position_data_size = r.u32_le().map_err(|_| Error::InvalidAnimation)?;

        if position_data_size != frame_count.wrapping_mul(4) {
            return Err(Error::FPosSizeMismatch {
                frames: frame_count,
                size: position_data_size,
            });
        }

        let mut positions = Vec::with_capacity(frame_count as usize);
        for _ in 0..frame_count {
            positions.push(r.f32_le().map_err(|_| Error::InvalidAnimation)?);
        }

        self.append_batch(frame_count, start_time, end_time);
        self.positions.push(PositionFrame {
            frame_count,
            start_time,
            end_time,
            positions,
        });
        Ok(())
    }

    /// One batch per position frame; its keyframes spread evenly over
    /// `[start_time, end_time]`.
    fn append_batch(&mut self, frame_count: u32, start_time: f32, end_time: f32) {
        let batch_id = self.batches.len() as u32 + 1;
        let keyframe_offset = self.keyframes.len() as u32;

        for i in 0..frame_count {
            let time = if frame_count < 2 {
                start_time
            } else {
                start_time + (end_time - start_time) * i as f32 / (frame_count - 1) as f32
            };
            self.keyframes.push(Keyframe { time, batch_id });
        }

        self.batches.push(AnimationBatch {
            batch_id,
            current_time: start_time,
            target_time: end_time,
            keyframe_count: frame_count,
            keyframe_offset,
            child_batch: 0,
            render_data: 0,
            is_active: true,
            requires_update: false,
        });
    }

    /// Sets a batch's current time, or the global clock when `batch` is
    /// `None`. With `recursive`, the time propagates through `child_batch`
    /// links (and into every batch for the global case).
    pub fn set_batch_time(
        &mut self,
        batch: Option<usize>,
        time: f32,
        recursive: bool,
    ) -> Result<(), Error> {
        match batch {
            None => {
                self.global_time = time;
                if recursive {
                    for index in 0..self.batches.len() {
                        self.set_batch_time(Some(index), time, true)?;
                    }
                }
                Ok(())
            }
            Some(index) => {
                let batch_count = self.batches.len();
                let batch = self
                    .batches
                    .get_mut(index)
                    .ok_or(Error::InvalidBatch(index))?;
                batch.current_time = time;

                if recursive {
                    // Follow the child chain; the hop budget breaks cycles.
                    let mut child = batch.child_batch;
                    let mut hops = 0;
                    while child != 0 && hops < batch_count {
                        let Some(next) = self.batches.iter_mut().find(|b| b.batch_id == child)
                        else {
                            break;
                        };
                        next.current_time = time;
                        child = next.child_batch;
                        hops += 1;
                    }
                }
                Ok(())
            }
        }
    }

    /// Finds the keyframe pair bracketing the batch's target time.
    pub fn interpolate_batch_keyframe(&self, index: usize) -> Result<BatchInterpolation, Error> {
        let batch = self.batches.get(index).ok_or(Error::InvalidBatch(index))?;

        if batch.keyframe_count == 0 {
            return Ok(BatchInterpolation {
                from: batch.batch_id,
                to: batch.batch_id,
                factor: 0.0,
                is_static: true,
            });
        }

        if self.global_time > batch.target_time {
            return Err(Error::BatchTimeOutOfRange {
                global: self.global_time,
                target: batch.target_time,
            });
        }

        let start = batch.keyframe_offset as usize;
        let end = start + batch.keyframe_count as usize;
        let window = self
            .keyframes
            .get(start..end)
            .ok_or(Error::InvalidAnimation)?;

        let target = batch.target_time;
        if target < window[0].time {
            return Ok(BatchInterpolation {
                from: window[0].batch_id,
                to: window[0].batch_id,
                factor: 0.0,
                is_static: true,
            });
        }

        for pair in window.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if from.time <= target && target < to.time {
                return Ok(BatchInterpolation {
                    from: from.batch_id,
                    to: to.batch_id,
                    factor: (target - from.time) / (to.time - from.time),
                    is_static: false,
                });
            }
            if from.time == to.time && from.time == target {
                return Ok(BatchInterpolation {
                    from: from.batch_id,
                    to: to.batch_id,
                    factor: 0.0,
                    is_static: true,
                });
            }
        }

        // Target at or past the last keyframe clamps to it.
        let last = window[window.len() - 1];
        Ok(BatchInterpolation {
            from: last.batch_id,
            to: last.batch_id,
            factor: 0.0,
            is_static: true,
        })
    }
}
