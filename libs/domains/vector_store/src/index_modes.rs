use serde_json::{Map, Value, json};

use crate::models::{IndexSpec, Provider};

pub const DEFAULT_INDEX_MODE: &str = "flat";

pub const INDEX_FLAT: &str = "FLAT";
pub const INDEX_IVF_FLAT: &str = "IVF_FLAT";
pub const INDEX_IVF_SQ8: &str = "IVF_SQ8";
pub const INDEX_HNSW: &str = "HNSW";

pub const HNSW_M: u64 = 16;
pub const HNSW_EF_CONSTRUCTION: u64 = 200;
pub const IVF_NLIST: u64 = 1024;

/// Named index configurations, in the order they are offered
pub const INDEX_MODES: &[&str] = &["flat", "ivf_flat", "ivf_sq8", "hnsw"];

/// Resolve an index mode to its index type and parameters.
///
/// Lookup is case-insensitive; unknown modes fall back to `flat`.
pub fn resolve(mode: &str) -> IndexSpec {
    let (index_type, params) = match mode.trim().to_ascii_lowercase().as_str() {
        "ivf_flat" => (INDEX_IVF_FLAT, json!({ "nlist": IVF_NLIST })),
        "ivf_sq8" => (INDEX_IVF_SQ8, json!({ "nlist": IVF_NLIST })),
        "hnsw" => (
            INDEX_HNSW,
            json!({ "M": HNSW_M, "efConstruction": HNSW_EF_CONSTRUCTION }),
        ),
        _ => (INDEX_FLAT, json!({})),
    };
    IndexSpec::new(index_type, into_map(params))
}

/// Index types a backend can build
pub fn supported_index_types(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Milvus | Provider::Local => &[INDEX_FLAT, INDEX_IVF_FLAT, INDEX_IVF_SQ8, INDEX_HNSW],
        Provider::Qdrant => &[INDEX_FLAT, INDEX_HNSW],
        Provider::Chroma => &[INDEX_HNSW],
    }
}

pub fn is_supported(provider: Provider, index_type: &str) -> bool {
    supported_index_types(provider)
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(index_type))
}

/// The index `provider` actually builds when asked for `requested`.
///
/// Supported types pass through unchanged. Chroma only builds HNSW graphs and
/// Qdrant has no inverted-file indexes, so both substitute HNSW with default
/// parameters. Unknown types fall back to the default mode elsewhere.
pub fn native_index(provider: Provider, requested: &IndexSpec) -> IndexSpec {
    if is_supported(provider, &requested.index_type) {
        return requested.clone();
    }
    match provider {
        Provider::Chroma | Provider::Qdrant => resolve("hnsw"),
        Provider::Milvus | Provider::Local => resolve(DEFAULT_INDEX_MODE),
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_modes() {
        let hnsw = resolve("hnsw");
        assert_eq!(hnsw.index_type, "HNSW");
        assert_eq!(hnsw.param_u64("M"), Some(16));
        assert_eq!(hnsw.param_u64("efConstruction"), Some(200));

        let ivf = resolve("IVF_SQ8");
        assert_eq!(ivf.index_type, "IVF_SQ8");
        assert_eq!(ivf.param_u64("nlist"), Some(1024));
    }

    #[test]
    fn test_unknown_mode_falls_back_to_flat() {
        let spec = resolve("annoy");
        assert_eq!(spec, resolve(DEFAULT_INDEX_MODE));
        assert_eq!(spec.index_type, "FLAT");
        assert!(spec.params.is_empty());
    }

    #[test]
    fn test_backend_support() {
        assert!(is_supported(Provider::Milvus, "IVF_FLAT"));
        assert!(is_supported(Provider::Qdrant, "hnsw"));
        assert!(!is_supported(Provider::Qdrant, "IVF_SQ8"));
        assert!(!is_supported(Provider::Chroma, "FLAT"));
        for mode in INDEX_MODES {
            assert!(is_supported(Provider::Local, &resolve(mode).index_type));
        }
    }

    #[test]
    fn test_native_index_substitutes_hnsw() {
        for mode in ["flat", "ivf_flat", "ivf_sq8", "hnsw"] {
            assert_eq!(native_index(Provider::Chroma, &resolve(mode)), resolve("hnsw"));
        }

        assert_eq!(native_index(Provider::Qdrant, &resolve("ivf_sq8")), resolve("hnsw"));
        assert_eq!(native_index(Provider::Qdrant, &resolve("flat")), resolve("flat"));
    }

    #[test]
    fn test_native_index_keeps_supported_params() {
        let mut custom = resolve("hnsw");
        custom.params.insert("M".to_string(), json!(32));
        assert_eq!(native_index(Provider::Chroma, &custom), custom);

        for provider in [Provider::Milvus, Provider::Local] {
            assert_eq!(native_index(provider, &resolve("ivf_sq8")), resolve("ivf_sq8"));
        }
        let unknown = IndexSpec::new("ANNOY", Map::new());
        assert_eq!(native_index(Provider::Milvus, &unknown), resolve("flat"));
    }
}
