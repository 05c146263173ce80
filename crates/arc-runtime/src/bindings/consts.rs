//! The `const` table: every stable name and index a cartridge may rely
//! on. Key codes are physical-key based and frozen across platforms and
//! runtime versions.

use rhai::{Dynamic, Module};

use arc_input::{axes, buttons, Key};

pub fn module() -> Module {
    let mut module = Module::new();

    // Key codes, by physical-key name (consts::KEY_Space and friends).
    for key in Key::ALL {
        module.set_var(format!("KEY_{}", key.name()), i64::from(key.code()));
    }

    // Mouse buttons.
    module.set_var("MOUSE_LEFT", 0_i64);
    module.set_var("MOUSE_RIGHT", 1_i64);
    module.set_var("MOUSE_MIDDLE", 2_i64);
    module.set_var("MOUSE_BACK", 3_i64);
    module.set_var("MOUSE_FORWARD", 4_i64);

    // Gamepad buttons (standard Xbox-style layout) and axes.
    module.set_var("PAD_SOUTH", buttons::SOUTH as i64);
    module.set_var("PAD_EAST", buttons::EAST as i64);
    module.set_var("PAD_WEST", buttons::WEST as i64);
    module.set_var("PAD_NORTH", buttons::NORTH as i64);
    module.set_var("PAD_L1", buttons::L1 as i64);
    module.set_var("PAD_R1", buttons::R1 as i64);
    module.set_var("PAD_SELECT", buttons::SELECT as i64);
    module.set_var("PAD_START", buttons::START as i64);
    module.set_var("PAD_L3", buttons::L3 as i64);
    module.set_var("PAD_R3", buttons::R3 as i64);
    module.set_var("PAD_DPAD_UP", buttons::DPAD_UP as i64);
    module.set_var("PAD_DPAD_DOWN", buttons::DPAD_DOWN as i64);
    module.set_var("PAD_DPAD_LEFT", buttons::DPAD_LEFT as i64);
    module.set_var("PAD_DPAD_RIGHT", buttons::DPAD_RIGHT as i64);
    module.set_var("AXIS_LEFT_X", axes::LEFT_X as i64);
    module.set_var("AXIS_LEFT_Y", axes::LEFT_Y as i64);
    module.set_var("AXIS_RIGHT_X", axes::RIGHT_X as i64);
    module.set_var("AXIS_RIGHT_Y", axes::RIGHT_Y as i64);
    module.set_var("AXIS_LEFT_TRIGGER", axes::LEFT_TRIGGER as i64);
    module.set_var("AXIS_RIGHT_TRIGGER", axes::RIGHT_TRIGGER as i64);

    // String enumerations, for discoverability from scripts.
    let strings = |values: &[&str]| -> Dynamic {
        Dynamic::from(
            values
                .iter()
                .map(|value| Dynamic::from(value.to_string()))
                .collect::<rhai::Array>(),
        )
    };
    module.set_var("ASPECT_MODES", strings(&["16:9", "4:3", "any"]));
    module.set_var("PRESETS", strings(&["low", "medium", "high", "ultra"]));
    module.set_var(
        "SCALING_MODES",
        strings(&["fit", "integer_nearest", "fill", "stretch"]),
    );
    module.set_var(
        "BLEND_MODES",
        strings(&[
            "normal",
            "srcOver",
            "multiply",
            "screen",
            "overlay",
            "darken",
            "lighten",
            "colorDodge",
            "colorBurn",
            "hardLight",
            "softLight",
            "difference",
            "exclusion",
            "add",
        ]),
    );
    module.set_var("LINE_JOINS", strings(&["miter", "round", "bevel"]));
    module.set_var("LINE_CAPS", strings(&["butt", "round", "square"]));
    module.set_var("SPREAD_MODES", strings(&["pad", "repeat", "reflect"]));
    module.set_var(
        "TEXT_ALIGNS",
        strings(&["left", "center", "right", "start", "end"]),
    );
    module.set_var(
        "TEXT_BASELINES",
        strings(&["top", "middle", "alphabetic", "bottom"]),
    );

    module
}
