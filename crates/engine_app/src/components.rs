//! Gameplay components persisted by the host.

use std::any::Any;

use engine_component::{
    Component, ConstructError, EntityId, FieldReader, FieldType, FieldValue, Shape,
    ShapedComponent,
};
use engine_persistence::{EntityPersistence, PersistError};

/// Register every component type, in table order.
pub fn register_all(engine: &mut EntityPersistence) -> Result<(), PersistError> {
    engine.register::<Physics>()?;
    engine.register::<Health>()?;
    engine.register::<Weapon>()?;
    engine.register::<Nameplate>()?;
    Ok(())
}

/// Position and ground contact.
#[derive(Debug, Clone, PartialEq)]
pub struct Physics {
    pub x: f32,
    pub y: f32,
    pub grounded: bool,
}

impl Component for Physics {
    fn shape_name(&self) -> &'static str {
        "Physics"
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.x.into(), self.y.into(), self.grounded.into()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ShapedComponent for Physics {
    fn shape() -> Shape {
        Shape::new("Physics")
            .field("x", FieldType::F32)
            .field("y", FieldType::F32)
            .field("grounded", FieldType::Bool)
    }

    fn from_fields(_owner: EntityId, values: Vec<FieldValue>) -> Result<Self, ConstructError> {
        let mut r = FieldReader::new("Physics", values);
        let physics = Self {
            x: r.next_f32()?,
            y: r.next_f32()?,
            grounded: r.next_bool()?,
        };
        r.finish()?;
        Ok(physics)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    #[must_use]
    pub fn full(max: i32) -> Self {
        Self { current: max, max }
    }
}

impl Component for Health {
    fn shape_name(&self) -> &'static str {
        "Health"
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.current.into(), self.max.into()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ShapedComponent for Health {
    fn shape() -> Shape {
        Shape::new("Health")
            .field("current", FieldType::I32)
            .field("max", FieldType::I32)
    }

    fn from_fields(_owner: EntityId, values: Vec<FieldValue>) -> Result<Self, ConstructError> {
        let mut r = FieldReader::new("Health", values);
        let health = Self {
            current: r.next_i32()?,
            max: r.next_i32()?,
        };
        r.finish()?;
        Ok(health)
    }
}

/// Weapon loadout and heat state. Shooting builds heat; overheating locks
/// the weapon for a penalty period.
#[derive(Debug, Clone, PartialEq)]
pub struct Weapon {
    /// Bit set of unlocked weapons.
    pub weapons: i32,
    pub current_weapon: i32,
    pub is_shooting: bool,
    pub is_ready: bool,
    pub max_heat: i32,
    pub current_heat: f32,
    /// Heat added per second while shooting.
    pub heat_rate: i32,
    /// Heat removed per second while idle.
    pub cool_rate: i32,
    /// Lockout in seconds after overheating.
    pub over_heating_penalty: i32,
    pub remaining_penalty: f32,
}

impl Default for Weapon {
    fn default() -> Self {
        Self {
            weapons: 1,
            current_weapon: 0,
            is_shooting: false,
            is_ready: true,
            max_heat: 100,
            current_heat: 0.0,
            heat_rate: 40,
            cool_rate: 25,
            over_heating_penalty: 3,
            remaining_penalty: 0.0,
        }
    }
}

impl Weapon {
    /// Advance heat by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        if self.remaining_penalty > 0.0 {
            self.remaining_penalty = (self.remaining_penalty - dt).max(0.0);
            self.is_ready = self.remaining_penalty == 0.0;
            self.current_heat = (self.current_heat - self.cool_rate as f32 * dt).max(0.0);
            return;
        }
        if self.is_shooting && self.is_ready {
            self.current_heat += self.heat_rate as f32 * dt;
            if self.current_heat >= self.max_heat as f32 {
                self.current_heat = self.max_heat as f32;
                self.is_ready = false;
                self.is_shooting = false;
                self.remaining_penalty = self.over_heating_penalty as f32;
            }
        } else {
            self.current_heat = (self.current_heat - self.cool_rate as f32 * dt).max(0.0);
        }
    }
}

impl Component for Weapon {
    fn shape_name(&self) -> &'static str {
        "Weapon"
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            self.weapons.into(),
            self.current_weapon.into(),
            self.is_shooting.into(),
            self.is_ready.into(),
            self.max_heat.into(),
            self.current_heat.into(),
            self.heat_rate.into(),
            self.cool_rate.into(),
            self.over_heating_penalty.into(),
            self.remaining_penalty.into(),
        ]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ShapedComponent for Weapon {
    fn shape() -> Shape {
        Shape::new("Weapon")
            .field("weapons", FieldType::I32)
            .field("currentWeapon", FieldType::I32)
            .field("isShooting", FieldType::Bool)
            .field("isReady", FieldType::Bool)
            .field("maxHeat", FieldType::I32)
            .field("currentHeat", FieldType::F32)
            .field("heatRate", FieldType::I32)
            .field("coolRate", FieldType::I32)
            .field("overHeatingPenalty", FieldType::I32)
            .field("remainingPenalty", FieldType::F32)
    }

    fn from_fields(_owner: EntityId, values: Vec<FieldValue>) -> Result<Self, ConstructError> {
        let mut r = FieldReader::new("Weapon", values);
        let weapon = Self {
            weapons: r.next_i32()?,
            current_weapon: r.next_i32()?,
            is_shooting: r.next_bool()?,
            is_ready: r.next_bool()?,
            max_heat: r.next_i32()?,
            current_heat: r.next_f32()?,
            heat_rate: r.next_i32()?,
            cool_rate: r.next_i32()?,
            over_heating_penalty: r.next_i32()?,
            remaining_penalty: r.next_f32()?,
        };
        r.finish()?;
        Ok(weapon)
    }
}

/// Display name and map glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct Nameplate {
    pub label: String,
    pub glyph: char,
}

impl Component for Nameplate {
    fn shape_name(&self) -> &'static str {
        "Nameplate"
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.label.clone().into(), self.glyph.into()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ShapedComponent for Nameplate {
    fn shape() -> Shape {
        Shape::new("Nameplate")
            .field("label", FieldType::String)
            .field("glyph", FieldType::Char)
    }

    fn from_fields(_owner: EntityId, values: Vec<FieldValue>) -> Result<Self, ConstructError> {
        let mut r = FieldReader::new("Nameplate", values);
        let nameplate = Self {
            label: r.next_string()?,
            glyph: r.next_char()?,
        };
        r.finish()?;
        Ok(nameplate)
    }
}
