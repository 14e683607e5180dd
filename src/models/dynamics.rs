//! Dynamic-mark table
//!
//! Fixed vocabulary of loudness marks. Each base mark from pppp to fff exists
//! in three shades: softened ("mf-"), plain ("mf") and pushed ("mf+"). The
//! shades share the base mark's level but step the velocity, so the full list
//! of 25 marks (silent plus 8 x 3) carries strictly increasing velocities.
//! Velocity 0 is reserved for "no mark given".

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DynamicMark {
    /// Text as written in the document ("mf-", "silent", ...).
    pub text: &'static str,
    /// Coarse loudness level: silent = 1, pppp = 2, ..., fff = 9.
    pub level: u8,
    /// Key velocity 1..=127. Never 0, which marks an unset velocity.
    pub velocity: u8,
}

static MARKS: Lazy<Vec<DynamicMark>> = Lazy::new(|| {
    let mut marks = vec![DynamicMark {
        text: "silent",
        level: 1,
        velocity: 1,
    }];
    let bases = ["pppp", "ppp", "pp", "p", "mf", "f", "ff", "fff"];
    let mut velocity = 6u8;
    for (index, base) in bases.iter().enumerate() {
        let level = index as u8 + 2;
        for shade in ["-", "", "+"] {
            marks.push(DynamicMark {
                text: shade_text(base, shade),
                level,
                velocity,
            });
            velocity += 5;
        }
    }
    marks
});

fn shade_text(base: &'static str, shade: &str) -> &'static str {
    // The table is tiny and immortal, so leaked strings are fine.
    match shade {
        "" => base,
        _ => Box::leak(format!("{}{}", base, shade).into_boxed_str()),
    }
}

impl DynamicMark {
    /// Look a mark up by its document text, case-insensitively.
    pub fn lookup(text: &str) -> Option<&'static DynamicMark> {
        let lowered = text.trim().to_ascii_lowercase();
        MARKS.iter().find(|mark| mark.text == lowered)
    }

    /// The full table in increasing-velocity order.
    pub fn all() -> &'static [DynamicMark] {
        &MARKS
    }

    /// The mark whose velocity matches exactly, when one exists. Interpolated
    /// velocities fall between table entries; see [`DynamicMark::for_level`].
    pub fn for_velocity(velocity: u8) -> Option<&'static DynamicMark> {
        MARKS.iter().find(|mark| mark.velocity == velocity)
    }

    /// The plain-shade mark of a dynamic level (1-9).
    pub fn for_level(level: u8) -> Option<&'static DynamicMark> {
        MARKS
            .iter()
            .find(|mark| mark.level == level && !mark.text.ends_with('-') && !mark.text.ends_with('+'))
    }
}
