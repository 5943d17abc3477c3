use candle_core::{Module, Tensor};
use candle_nn::{linear_no_bias, Linear, VarBuilder};
use candle_transformers::models::clip::vision_model::{ClipVisionConfig, ClipVisionTransformer};

/// Architectures the native runtime can rebuild from a parameter mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeArchitecture {
    /// CLIP ViT-B/32 image tower followed by the visual projection.
    ClipVitB32,
}

static VIT_B_32: [&str; 2] = ["ViT-B-32", "vit-b-32"];

impl NativeArchitecture {
    /// Accepts the open_clip spelling and the usual variants of it.
    pub fn from_str(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "vitb32" | "clipvitb32" | "clipvitbasepatch32" | "openaiclipvitbasepatch32" => {
                Some(NativeArchitecture::ClipVitB32)
            }
            _ => None,
        }
    }

    pub fn str(&self) -> &'static str {
        match self {
            NativeArchitecture::ClipVitB32 => VIT_B_32[0],
        }
    }

    pub fn str_lowercase(&self) -> &'static str {
        match self {
            NativeArchitecture::ClipVitB32 => VIT_B_32[1],
        }
    }

    pub fn image_size(&self) -> usize {
        match self {
            NativeArchitecture::ClipVitB32 => ClipVisionConfig::vit_base_patch32().image_size,
        }
    }

    /// Binds `vb` to the architecture's parameter names (Hugging Face CLIP layout).
    pub fn build(&self, vb: VarBuilder) -> candle_core::Result<ClipImageEncoder> {
        match self {
            NativeArchitecture::ClipVitB32 => {
                ClipImageEncoder::new(vb, &ClipVisionConfig::vit_base_patch32())
            }
        }
    }
}

impl std::fmt::Display for NativeArchitecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.str())
    }
}

/// Image half of a CLIP model: vision transformer, pooled token, projection.
pub struct ClipImageEncoder {
    vision_model: ClipVisionTransformer,
    visual_projection: Linear,
}

impl ClipImageEncoder {
    pub fn new(vb: VarBuilder, config: &ClipVisionConfig) -> candle_core::Result<Self> {
        let vision_model = ClipVisionTransformer::new(vb.pp("vision_model"), config)?;
        let visual_projection = linear_no_bias(
            config.embed_dim,
            config.projection_dim,
            vb.pp("visual_projection"),
        )?;
        Ok(Self {
            vision_model,
            visual_projection,
        })
    }
}

impl Module for ClipImageEncoder {
    fn forward(&self, pixel_values: &Tensor) -> candle_core::Result<Tensor> {
        let pooled = self.vision_model.forward(pixel_values)?;
        self.visual_projection.forward(&pooled)
    }
}
