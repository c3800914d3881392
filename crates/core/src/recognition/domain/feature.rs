use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Opaque biometric descriptor. Only the analyzer that produced it knows
/// how to compare it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Serializes an embedding as little-endian `f32` bytes.
    pub fn from_embedding(embedding: &[f32]) -> Self {
        Self(embedding.iter().flat_map(|v| v.to_le_bytes()).collect())
    }

    /// Reverses [`FeatureVector::from_embedding`]; `None` if the byte length
    /// is not a whole number of `f32`s.
    pub fn to_embedding(&self) -> Option<Vec<f32>> {
        if self.0.len() % 4 != 0 {
            return None;
        }
        Some(
            self.0
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Standard-alphabet base64, the form the web application stores.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(encoded.trim()).map(Self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

/// Result of the provider's combined liveness/age/gender pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceAttributes {
    pub liveness: bool,
    pub age: u32,
    pub gender: Gender,
}
