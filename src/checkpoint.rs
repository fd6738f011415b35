//! Binary Checkpoints
//!
//! Model weights are written in a fixed field order with no header or
//! version tag. All integers and floats are little-endian.
//!
//! ## Format
//!
//! ```text
//! i32 vocab, i32 dim, i32 seq_len
//! token embedding     i32 vocab,   i32 dim, u64 n, n × f64
//! position embedding  i32 seq_len, i32 dim, u64 n, n × f64
//! ln1, ln2            i32 dim, u64 n, γ, u64 n, β
//! attn q, k, v, out   i32 in, i32 out, u64 n, W, u64 n, b
//! mlp fc1, fc2        (Linear layout)
//! head                (Linear layout)
//! ```
//!
//! Gradients and activation caches are not stored.
//!
//! ## Loading
//!
//! Loading is all-or-nothing. The whole stream is decoded into staging
//! buffers and every header is checked against the live model before any
//! parameter is touched, so a truncated or mismatched file leaves the model
//! exactly as it was. A successful load resets every gradient to zero.

use crate::error::{Error, Result};
use crate::layers::{Layer, TrainableEmbedding, TrainableLayerNorm, TrainableLinear};
use crate::model::TrainableTransformer;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

impl TrainableTransformer {
    /// Write the weights to `path`, replacing any existing file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut out = BufWriter::new(File::create(path)?);
        write_to(self, &mut out)?;
        out.flush()?;

        info!(
            path = %path.display(),
            parameters = self.parameter_count(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Replace the weights with those stored at `path`
    ///
    /// On error the model is unchanged.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut input = BufReader::new(File::open(path)?);
        read_from(self, &mut input)?;

        info!(path = %path.display(), "checkpoint loaded");
        Ok(())
    }
}

/// Encode the model's weights into `w`
pub fn write_to<W: Write>(model: &TrainableTransformer, w: &mut W) -> Result<()> {
    let config = model.config();
    write_i32(w, config.vocab_size)?;
    write_i32(w, config.n_embd)?;
    write_i32(w, config.seq_len)?;

    write_embedding(w, &model.token_emb)?;
    write_embedding(w, &model.pos_emb)?;

    let block = &model.block;
    write_layer_norm(w, &block.ln1)?;
    write_layer_norm(w, &block.ln2)?;
    for proj in [
        &block.attn.q_proj,
        &block.attn.k_proj,
        &block.attn.v_proj,
        &block.attn.out_proj,
    ] {
        write_linear(w, proj)?;
    }
    write_linear(w, &block.mlp.fc1)?;
    write_linear(w, &block.mlp.fc2)?;
    write_linear(w, &model.head)
}

/// Decode weights from `r` into `model`
///
/// Nothing is written to `model` unless the entire stream decodes and
/// matches its shapes.
pub fn read_from<R: Read>(model: &mut TrainableTransformer, r: &mut R) -> Result<()> {
    let stored_vocab = read_i32(r)?;
    let stored_dim = read_i32(r)?;
    let stored_seq_len = read_i32(r)?;

    let config = model.config();
    let matches = [
        (stored_vocab, config.vocab_size),
        (stored_dim, config.n_embd),
        (stored_seq_len, config.seq_len),
    ]
    .iter()
    .all(|&(stored, live)| stored as i64 == live as i64);
    if !matches {
        return Err(Error::DimensionMismatch {
            stored_vocab,
            stored_dim,
            stored_seq_len,
            vocab: config.vocab_size,
            dim: config.n_embd,
            seq_len: config.seq_len,
        });
    }

    let mut staged = Vec::new();
    read_embedding(r, &model.token_emb, "token_embedding", &mut staged)?;
    read_embedding(r, &model.pos_emb, "position_embedding", &mut staged)?;

    let block = &model.block;
    read_layer_norm(r, &block.ln1, "ln1", &mut staged)?;
    read_layer_norm(r, &block.ln2, "ln2", &mut staged)?;
    for (name, proj) in [
        ("attn.q_proj", &block.attn.q_proj),
        ("attn.k_proj", &block.attn.k_proj),
        ("attn.v_proj", &block.attn.v_proj),
        ("attn.out_proj", &block.attn.out_proj),
    ] {
        read_linear(r, proj, name, &mut staged)?;
    }
    read_linear(r, &block.mlp.fc1, "mlp.fc1", &mut staged)?;
    read_linear(r, &block.mlp.fc2, "mlp.fc2", &mut staged)?;
    read_linear(r, &model.head, "head", &mut staged)?;

    // Commit
    for (param, data) in model.parameters_mut().into_iter().zip(staged) {
        param.value.data = data;
        param.zero_grad();
    }
    Ok(())
}

fn write_i32<W: Write>(w: &mut W, value: usize) -> Result<()> {
    let value = i32::try_from(value).map_err(|_| {
        Error::InvalidConfig(format!("{value} does not fit the checkpoint's i32 fields"))
    })?;
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_floats<W: Write>(w: &mut W, values: &[f64]) -> Result<()> {
    w.write_all(&(values.len() as u64).to_le_bytes())?;
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    w.write_all(&bytes)?;
    Ok(())
}

fn write_embedding<W: Write>(w: &mut W, emb: &TrainableEmbedding) -> Result<()> {
    write_i32(w, emb.count)?;
    write_i32(w, emb.dim)?;
    write_floats(w, &emb.weight.value.data)
}

fn write_layer_norm<W: Write>(w: &mut W, ln: &TrainableLayerNorm) -> Result<()> {
    write_i32(w, ln.dim)?;
    write_floats(w, &ln.gamma.value.data)?;
    write_floats(w, &ln.beta.value.data)
}

fn write_linear<W: Write>(w: &mut W, lin: &TrainableLinear) -> Result<()> {
    write_i32(w, lin.in_dim)?;
    write_i32(w, lin.out_dim)?;
    write_floats(w, &lin.weight.value.data)?;
    write_floats(w, &lin.bias.value.data)
}

fn read_i32<R: Read>(r: &mut R) -> Result<i32> {
    let mut bytes = [0u8; 4];
    r.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut bytes = [0u8; 8];
    r.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

/// Read a length-prefixed float array whose length must be `expected`
fn read_floats<R: Read>(r: &mut R, expected: usize, name: &str) -> Result<Vec<f64>> {
    let n = read_u64(r)?;
    if n != expected as u64 {
        return Err(Error::ShapeMismatch {
            name: name.to_string(),
            expected: format!("{expected} values"),
            found: format!("{n} values"),
        });
    }
    let mut bytes = vec![0u8; expected * 8];
    r.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut b = [0u8; 8];
            b.copy_from_slice(chunk);
            f64::from_le_bytes(b)
        })
        .collect())
}

/// Check a stored `[a, b]` extent against the live layer
fn expect_extent(name: &str, stored: (i32, i32), live: (usize, usize)) -> Result<()> {
    if stored.0 as i64 == live.0 as i64 && stored.1 as i64 == live.1 as i64 {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            name: name.to_string(),
            expected: format!("[{}, {}]", live.0, live.1),
            found: format!("[{}, {}]", stored.0, stored.1),
        })
    }
}

fn read_embedding<R: Read>(
    r: &mut R,
    emb: &TrainableEmbedding,
    name: &str,
    staged: &mut Vec<Vec<f64>>,
) -> Result<()> {
    let count = read_i32(r)?;
    let dim = read_i32(r)?;
    expect_extent(name, (count, dim), (emb.count, emb.dim))?;
    staged.push(read_floats(r, emb.weight.len(), name)?);
    Ok(())
}

fn read_layer_norm<R: Read>(
    r: &mut R,
    ln: &TrainableLayerNorm,
    name: &str,
    staged: &mut Vec<Vec<f64>>,
) -> Result<()> {
    let dim = read_i32(r)?;
    expect_extent(name, (1, dim), (1, ln.dim))?;
    staged.push(read_floats(r, ln.dim, &format!("{name}.gamma"))?);
    staged.push(read_floats(r, ln.dim, &format!("{name}.beta"))?);
    Ok(())
}

fn read_linear<R: Read>(
    r: &mut R,
    lin: &TrainableLinear,
    name: &str,
    staged: &mut Vec<Vec<f64>>,
) -> Result<()> {
    let in_dim = read_i32(r)?;
    let out_dim = read_i32(r)?;
    expect_extent(name, (in_dim, out_dim), (lin.in_dim, lin.out_dim))?;
    staged.push(read_floats(r, lin.weight.len(), &format!("{name}.weight"))?);
    staged.push(read_floats(r, lin.out_dim, &format!("{name}.bias"))?);
    Ok(())
}
