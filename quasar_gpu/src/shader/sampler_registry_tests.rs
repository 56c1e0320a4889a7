use super::*;

#[test]
fn test_defaults_are_registered() {
    let registry = SamplerRegistry::with_defaults();
    assert_eq!(registry.len(), 6);
    assert_eq!(registry.index_of("point_wrap"), Some(0));
    assert_eq!(registry.index_of("shadow_compare"), Some(5));
    assert_eq!(registry.samplers()[5].comparison, Some(CompareOp::LessOrEqual));
    assert_eq!(registry.samplers()[4].max_anisotropy, 16);
}

#[test]
fn test_register_returns_next_index() {
    let mut registry = SamplerRegistry::new();
    assert!(registry.is_empty());
    let index = registry
        .register(StaticSampler::new("ui_point", Filter::Point, AddressMode::Clamp))
        .unwrap();
    assert_eq!(index, 0);
    assert_eq!(registry.index_of("ui_point"), Some(0));
}

#[test]
fn test_duplicate_name_fails() {
    let mut registry = SamplerRegistry::with_defaults();
    let result = registry.register(StaticSampler::new("linear_wrap", Filter::Linear, AddressMode::Wrap));
    assert!(result.is_err());
    assert_eq!(registry.len(), 6);
}
