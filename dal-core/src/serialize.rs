//! Persisted-state layout for partial results and trained models
//! (spec §4.7/§9): a versioned sequence `{u32 tag, u32 version, nested
//! objects}`. This covers serializing the linear-model core's own objects
//! for checkpointing or shipping between processes — it is deliberately
//! narrower than a general on-disk storage format (directories, indexing,
//! migration across formats), which the spec's non-goals exclude.
//!
//! Endianness is host-native and archives are not portable across
//! architectures (spec §4.7), so this writes/reads native byte order
//! directly rather than pulling in a portable wire-format crate.

use crate::error::{DalError, DalResult};
use crate::linear_model::{PartialModel, TrainedModel};

const PARTIAL_MODEL_TAG: u32 = 0x5041_524d; // "PARM"
const TRAINED_MODEL_TAG: u32 = 0x5452_4e44; // "TRND"
const FORMAT_VERSION: u32 = 1;

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_ne_bytes());
}

fn write_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_ne_bytes());
}

fn write_f64_slice(out: &mut Vec<u8>, v: &[f64]) {
    for &x in v {
        out.extend_from_slice(&x.to_ne_bytes());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> DalResult<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(DalError::InvalidArgument(
                "persisted-state archive is truncated".into(),
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> DalResult<u32> {
        Ok(u32::from_ne_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_i64(&mut self) -> DalResult<i64> {
        Ok(i64::from_ne_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn read_u8(&mut self) -> DalResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_f64_vec(&mut self, count: usize) -> DalResult<Vec<f64>> {
        let bytes = self.take(count * 8)?;
        Ok(bytes
            .chunks_exact(8)
            .map(|c| f64::from_ne_bytes(c.try_into().unwrap()))
            .collect())
    }
}

/// Serializes a partial accumulator's moments: `{xtx, xty, n}` plus enough
/// shape metadata to reconstruct it.
pub fn serialize_partial(model: &PartialModel) -> Vec<u8> {
    let mut out = Vec::new();
    write_u32(&mut out, PARTIAL_MODEL_TAG);
    write_u32(&mut out, FORMAT_VERSION);
    write_u32(&mut out, model.feature_count() as u32);
    write_u32(&mut out, model.response_count() as u32);
    out.push(model.has_intercept() as u8);
    write_i64(&mut out, model.observation_count());
    write_f64_slice(&mut out, model.xtx());
    write_f64_slice(&mut out, model.xty());
    out
}

pub fn deserialize_partial(bytes: &[u8]) -> DalResult<PartialModel> {
    let mut r = Reader::new(bytes);
    let tag = r.read_u32()?;
    if tag != PARTIAL_MODEL_TAG {
        return Err(DalError::InvalidArgument(format!(
            "expected partial-model tag {PARTIAL_MODEL_TAG:#x}, got {tag:#x}"
        )));
    }
    let version = r.read_u32()?;
    if version != FORMAT_VERSION {
        return Err(DalError::InvalidArgument(format!(
            "unsupported persisted-state version {version}"
        )));
    }
    let feature_count = r.read_u32()? as usize;
    let response_count = r.read_u32()? as usize;
    let intercept = r.read_u8()? != 0;
    let n = r.read_i64()?;
    let dim = feature_count + if intercept { 1 } else { 0 };
    let xtx = r.read_f64_vec(dim * dim)?;
    let xty = r.read_f64_vec(dim * response_count)?;
    PartialModel::from_raw_parts(feature_count, response_count, intercept, n, xtx, xty)
}

/// Serializes a trained model's coefficients (`betas`, intercept-first).
pub fn serialize_trained(model: &TrainedModel) -> Vec<u8> {
    let mut out = Vec::new();
    write_u32(&mut out, TRAINED_MODEL_TAG);
    write_u32(&mut out, FORMAT_VERSION);
    write_u32(&mut out, model.feature_count() as u32);
    write_u32(&mut out, model.response_count() as u32);
    write_f64_slice(&mut out, model.betas());
    out
}

pub fn deserialize_trained(bytes: &[u8]) -> DalResult<TrainedModel> {
    let mut r = Reader::new(bytes);
    let tag = r.read_u32()?;
    if tag != TRAINED_MODEL_TAG {
        return Err(DalError::InvalidArgument(format!(
            "expected trained-model tag {TRAINED_MODEL_TAG:#x}, got {tag:#x}"
        )));
    }
    let version = r.read_u32()?;
    if version != FORMAT_VERSION {
        return Err(DalError::InvalidArgument(format!(
            "unsupported persisted-state version {version}"
        )));
    }
    let feature_count = r.read_u32()? as usize;
    let response_count = r.read_u32()? as usize;
    let betas = r.read_f64_vec(response_count * (feature_count + 1))?;
    TrainedModel::from_raw_parts(feature_count, response_count, betas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_model_round_trips() {
        let mut p = PartialModel::new(2, 1, true);
        p.update(&[1.0, 2.0, 3.0, 4.0], &[3.0, 7.0], 2).unwrap();
        let bytes = serialize_partial(&p);
        let back = deserialize_partial(&bytes).unwrap();
        assert_eq!(back.xtx(), p.xtx());
        assert_eq!(back.xty(), p.xty());
        assert_eq!(back.observation_count(), p.observation_count());
    }

    #[test]
    fn trained_model_round_trips() {
        let mut p = PartialModel::new(2, 1, true);
        p.update(
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            &[3.0, 7.0, 11.0, 15.0],
            4,
        )
        .unwrap();
        let model = crate::linear_model::finalize(&mut p, None).unwrap();
        let bytes = serialize_trained(&model);
        let back = deserialize_trained(&bytes).unwrap();
        assert_eq!(back.betas(), model.betas());
    }

    #[test]
    fn wrong_tag_is_rejected() {
        let bytes = vec![0u8; 16];
        assert!(deserialize_partial(&bytes).is_err());
    }

    #[test]
    fn truncated_archive_is_rejected() {
        let mut p = PartialModel::new(1, 1, false);
        p.update(&[1.0], &[1.0], 1).unwrap();
        let mut bytes = serialize_partial(&p);
        bytes.truncate(bytes.len() - 4);
        assert!(deserialize_partial(&bytes).is_err());
    }
}
