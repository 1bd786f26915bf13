use bevy::prelude::*;

/// Scene object that parent references can name. Its descendants carrying
/// [`KeyclipPart`] become the atom's resolvable parts.
#[derive(Component, Debug, Clone)]
pub struct KeyclipAtom {
    pub id: String,
}

/// Rigid sub-part of the nearest [`KeyclipAtom`] ancestor; its `GlobalTransform`
/// is the parent frame.
#[derive(Component, Debug, Clone)]
pub struct KeyclipPart {
    pub name: String,
}

/// Entity whose `Transform` is driven by transform targets keyed on `name`.
#[derive(Component, Debug, Clone)]
pub struct KeyclipController {
    pub name: String,
}
