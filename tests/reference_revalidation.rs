use entity_registry::{EcrError, Registry, RegistryConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Health(i32);
#[derive(Debug, Clone, Copy, PartialEq)]
struct Shield(i32);

#[test]
fn a_reference_tracks_value_updates_through_put() {
    let registry = Registry::new(RegistryConfig::sequential()).unwrap();
    let h = registry.insert((Health(100),)).unwrap();
    let r = registry.get_ref::<Health>(h).unwrap();

    assert_eq!(r.value().unwrap(), Health(100));
    registry.put(h, (Health(50),)).unwrap();
    assert_eq!(r.value().unwrap(), Health(50), "reference re-reads current state, not a cached copy");
}

#[test]
fn a_reference_survives_an_unrelated_migration() {
    let registry = Registry::new(RegistryConfig::sequential()).unwrap();
    let h = registry.insert((Health(100),)).unwrap();
    let r = registry.get_ref::<Health>(h).unwrap();

    registry.put(h, (Shield(10),)).unwrap(); // migrates the entity to a new archetype
    assert!(r.is_valid(), "Health is still present after the migration, even though the row moved");
    assert_eq!(r.value().unwrap(), Health(100));
}

#[test]
fn a_reference_goes_stale_when_its_component_is_removed() {
    let registry = Registry::new(RegistryConfig::sequential()).unwrap();
    let h = registry.insert((Health(100), Shield(10))).unwrap();
    let r = registry.get_ref::<Shield>(h).unwrap();

    registry.erase_components::<(Shield,)>(h).unwrap();
    assert!(!r.is_valid());
    assert_eq!(r.value(), Err(EcrError::StaleReference));
}

#[test]
fn a_reference_goes_stale_when_the_entity_is_erased() {
    let registry = Registry::new(RegistryConfig::sequential()).unwrap();
    let h = registry.insert((Health(100),)).unwrap();
    let r = registry.get_ref::<Health>(h).unwrap();

    registry.erase(h).unwrap();
    assert!(!r.is_valid());
    assert_eq!(r.value(), Err(EcrError::StaleReference));
}

#[test]
fn get_ref_for_a_component_the_entity_does_not_have_is_a_missing_component_error() {
    let registry = Registry::new(RegistryConfig::sequential()).unwrap();
    let h = registry.insert((Health(100),)).unwrap();
    assert_eq!(registry.get_ref::<Shield>(h).err(), Some(EcrError::MissingComponent));
}
