use serde::Deserialize;
use serde_json::{json, Value};

use super::{invalid, parse_args};
use crate::app::Library;
use crate::errors::Result;
use crate::image_codec::{self, DEFAULT_MAX_EMBED_MB, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, DEFAULT_QUALITY};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompressArgs {
    /// Image file on disk
    #[serde(default)]
    path:       Option<String>,
    /// Image already embedded as a data URI
    #[serde(default)]
    data_uri:   Option<String>,
    #[serde(default = "default_width")]
    max_width:  u32,
    #[serde(default = "default_height")]
    max_height: u32,
    #[serde(default = "default_quality")]
    quality:    f32,
}

fn default_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_quality() -> f32 {
    DEFAULT_QUALITY
}

/// Recompress an image into a JPEG data URI ready to store on a prompt
///
/// Undecodable input is embedded unchanged with `compressed: false`.
pub fn compress(_library: &Library, args: Value) -> Result<Value> {
    let args: CompressArgs = parse_args("image.compress", args)?;
    if !(0.0..=1.0).contains(&args.quality) {
        return Err(invalid("image.compress", "quality must be between 0 and 1"));
    }

    let bytes = match (&args.path, &args.data_uri) {
        (Some(path), None) => std::fs::read(path)?,
        (None, Some(uri)) => image_codec::decode_data_uri(uri)?.1,
        _ => return Err(invalid("image.compress", "expected exactly one of 'path' or 'dataUri'")),
    };

    let (data_uri, compressed) =
        match image_codec::compress(&bytes, args.max_width, args.max_height, args.quality) {
            Ok(uri) => (uri, true),
            Err(e) => {
                tracing::warn!(error = %e, "Image compression failed, embedding original");
                (image_codec::embed_uncompressed(&bytes, None), false)
            },
        };

    Ok(json!({
        "dataUri": data_uri,
        "compressed": compressed,
        "bytes": image_codec::estimated_size(&data_uri),
        "tooLarge": image_codec::is_too_large(&data_uri, DEFAULT_MAX_EMBED_MB),
    }))
}
