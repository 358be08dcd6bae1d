//! Manifests compiled into the binary

/// `(file name, YAML)` of every built-in manifest
pub(super) const BUILTIN_MANIFESTS: &[(&str, &str)] = &[
    (
        "bvlc_alexnet.yml",
        include_str!("../../builtin_models/bvlc_alexnet.yml"),
    ),
    (
        "resnet50.yml",
        include_str!("../../builtin_models/resnet50.yml"),
    ),
    (
        "squeezenet.yml",
        include_str!("../../builtin_models/squeezenet.yml"),
    ),
];
