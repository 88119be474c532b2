use crate::graph::control_graph::{ControlSetting, ATTR_VOICE_VOLUME};
use crate::models::error::ControlError;
use crate::traits::mixer::{ControlKind, MixerSession};

/// A raw setting coerced to the kind the live control reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlValue {
    Bool(bool),
    Int(i32),
    Byte(u8),
    /// Enumerated (or unclassified) controls are selected by label.
    Label(String),
}

impl ControlValue {
    /// Coerce `raw` for a control of `kind`.
    ///
    /// Booleans are on only for the literal `"on"`. Integers use the
    /// leading decimal number of the value, so a `"min-max"` range writes
    /// its minimum and a value with no leading number writes 0. Bytes keep
    /// the low eight bits.
    pub fn coerce(kind: ControlKind, name: &str, raw: &str) -> Self {
        let parse = || {
            leading_int(raw).unwrap_or_else(|| {
                log::warn!("Control {} value {:?} is not a number, writing 0", name, raw);
                0
            })
        };

        match kind {
            ControlKind::Boolean => ControlValue::Bool(raw == "on"),
            ControlKind::Integer => ControlValue::Int(parse()),
            ControlKind::Byte => ControlValue::Byte((parse() & 0xff) as u8),
            ControlKind::Enumerated | ControlKind::Unknown => ControlValue::Label(raw.to_string()),
        }
    }

    /// Integer written to each value slot, `None` for label writes.
    pub fn as_slot_value(&self) -> Option<i32> {
        match self {
            ControlValue::Bool(on) => Some(*on as i32),
            ControlValue::Int(value) => Some(*value),
            ControlValue::Byte(value) => Some(*value as i32),
            ControlValue::Label(_) => None,
        }
    }
}

fn leading_int(raw: &str) -> Option<i32> {
    let s = raw.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].parse::<i64>().ok()?;
    Some((sign * magnitude).clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

/// Resolve `setting` on the open session, coerce its value and write it.
///
/// Numeric values go to every value slot the control exposes.
pub fn apply(session: &mut dyn MixerSession, setting: &ControlSetting) -> Result<(), ControlError> {
    let info = session
        .control(&setting.name)
        .ok_or_else(|| ControlError::Unresolvable(setting.name.clone()))?;
    let value = ControlValue::coerce(info.kind, &setting.name, &setting.value);

    log::debug!("Setting {} to {}", setting.name, setting.value);

    let rejected = |reason: String| ControlError::WriteRejected {
        name: setting.name.clone(),
        reason,
    };

    match value {
        ControlValue::Label(label) => session.set_enum_by_label(&setting.name, &label).map_err(rejected),
        numeric => {
            let slot_value = numeric.as_slot_value().unwrap_or_default();
            for index in 0..info.value_count {
                session
                    .set_value(&setting.name, index, slot_value)
                    .map_err(&rejected)?;
            }
            Ok(())
        }
    }
}

/// Apply `list` in order, stopping at the first failure.
///
/// Controls already written stay written. Voice-volume controls are
/// skipped: they are driven only by volume calls.
pub fn apply_list(session: &mut dyn MixerSession, list: &[ControlSetting]) -> Result<(), ControlError> {
    for setting in list {
        if setting.has_attr(ATTR_VOICE_VOLUME) {
            log::debug!("Skipping voice volume control {}", setting.name);
            continue;
        }
        if let Err(e) = apply(session, setting) {
            log::error!("Unable to set control {}: {}", setting.name, e);
            return Err(e);
        }
    }
    Ok(())
}
