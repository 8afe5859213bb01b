use entity_registry::{Ref, Registry, RegistryConfig};

#[derive(Debug, Clone, PartialEq)]
struct Health(i32);

const ENEMY: u64 = 1;
const PLAYER: u64 = 2;

#[test]
fn view_with_tag_only_visits_entities_carrying_that_tag() {
    let registry = Registry::new(RegistryConfig::sequential()).unwrap();
    let player = registry.insert((Health(100),)).unwrap();
    let enemy_a = registry.insert((Health(30),)).unwrap();
    let enemy_b = registry.insert((Health(40),)).unwrap();
    registry.add_tags(player, &[PLAYER]).unwrap();
    registry.add_tags(enemy_a, &[ENEMY]).unwrap();
    registry.add_tags(enemy_b, &[ENEMY]).unwrap();

    let mut enemies: Vec<_> = registry.view::<Ref<Health>>().with_tag(ENEMY).map(|(h, _)| h).collect();
    enemies.sort_by_key(|h| h.index());
    let mut expected = vec![enemy_a, enemy_b];
    expected.sort_by_key(|h| h.index());
    assert_eq!(enemies, expected);
}

#[test]
fn view_without_tag_excludes_entities_carrying_that_tag() {
    let registry = Registry::new(RegistryConfig::sequential()).unwrap();
    let player = registry.insert((Health(100),)).unwrap();
    let enemy = registry.insert((Health(30),)).unwrap();
    registry.add_tags(player, &[PLAYER]).unwrap();
    registry.add_tags(enemy, &[ENEMY]).unwrap();

    let not_enemies: Vec<_> = registry.view::<Ref<Health>>().without_tag(ENEMY).map(|(h, _)| h).collect();
    assert_eq!(not_enemies, vec![player]);
}

#[test]
fn erasing_a_tag_that_was_never_set_is_a_silent_no_op() {
    let registry = Registry::new(RegistryConfig::sequential()).unwrap();
    let h = registry.insert((Health(100),)).unwrap();
    registry.erase_tags(h, &[ENEMY]).unwrap();
    assert_eq!(registry.get::<Health>(h).unwrap(), Health(100));
}

#[test]
fn adding_and_then_removing_a_tag_leaves_only_the_original_components() {
    let registry = Registry::new(RegistryConfig::sequential()).unwrap();
    let h = registry.insert((Health(100),)).unwrap();
    registry.add_tags(h, &[ENEMY]).unwrap();
    assert_eq!(registry.view::<Ref<Health>>().with_tag(ENEMY).count(), 1);

    registry.erase_tags(h, &[ENEMY]).unwrap();
    assert_eq!(registry.view::<Ref<Health>>().with_tag(ENEMY).count(), 0);
    assert_eq!(registry.get::<Health>(h).unwrap(), Health(100));
}
