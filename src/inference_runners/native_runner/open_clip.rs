//! Renames an open_clip state dict to the Hugging Face CLIP layout the native
//! encoder binds to.
//!
//! Only the image tower (`visual.*`) is kept. The fused attention projection is
//! split into q/k/v, and `visual.proj` (applied as `x @ proj`) is transposed into
//! a linear weight.

use std::collections::HashMap;

use candle_core::Tensor;

/// Present in every open_clip vision transformer checkpoint.
const OPEN_CLIP_MARKER: &str = "visual.conv1.weight";

const QKV: [&str; 3] = ["q_proj", "k_proj", "v_proj"];

pub fn is_open_clip(tensors: &HashMap<String, Tensor>) -> bool {
    tensors.contains_key(OPEN_CLIP_MARKER)
}

pub fn remap(tensors: HashMap<String, Tensor>) -> candle_core::Result<HashMap<String, Tensor>> {
    let mut out = HashMap::with_capacity(tensors.len());

    for (name, tensor) in tensors {
        // text tower, logit scale
        let Some(rest) = name.strip_prefix("visual.") else {
            continue;
        };

        if let Some(block) = rest.strip_prefix("transformer.resblocks.") {
            let Some((index, param)) = block.split_once('.') else {
                log::debug!("Skipping {name}");
                continue;
            };
            let layer = format!("vision_model.encoder.layers.{index}");
            match param {
                "attn.in_proj_weight" | "attn.in_proj_bias" => {
                    let kind = if param.ends_with("weight") { "weight" } else { "bias" };
                    let width = tensor.dim(0)? / 3;
                    for (i, proj) in QKV.iter().enumerate() {
                        let part = tensor.narrow(0, i * width, width)?.contiguous()?;
                        out.insert(format!("{layer}.self_attn.{proj}.{kind}"), part);
                    }
                }
                other => match block_param(other) {
                    Some(mapped) => {
                        out.insert(format!("{layer}.{mapped}"), tensor);
                    }
                    None => log::debug!("Skipping {name}"),
                },
            }
            continue;
        }

        let mapped = match rest {
            "proj" => {
                out.insert("visual_projection.weight".to_string(), tensor.t()?.contiguous()?);
                continue;
            }
            "class_embedding" => "vision_model.embeddings.class_embedding".to_string(),
            "positional_embedding" => "vision_model.embeddings.position_embedding.weight".to_string(),
            "conv1.weight" => "vision_model.embeddings.patch_embedding.weight".to_string(),
            _ => {
                if let Some(leaf) = rest.strip_prefix("ln_pre.") {
                    format!("vision_model.pre_layrnorm.{leaf}")
                } else if let Some(leaf) = rest.strip_prefix("ln_post.") {
                    format!("vision_model.post_layernorm.{leaf}")
                } else {
                    log::debug!("Skipping {name}");
                    continue;
                }
            }
        };
        out.insert(mapped, tensor);
    }

    Ok(out)
}

fn block_param(param: &str) -> Option<String> {
    let (module, leaf) = param.rsplit_once('.')?;
    let mapped = match module {
        "ln_1" => "layer_norm1",
        "ln_2" => "layer_norm2",
        "attn.out_proj" => "self_attn.out_proj",
        "mlp.c_fc" => "mlp.fc1",
        "mlp.c_proj" => "mlp.fc2",
        _ => return None,
    };
    Some(format!("{mapped}.{leaf}"))
}
