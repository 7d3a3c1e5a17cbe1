//! planner theme command implementations.

use serde::Serialize;

use crate::cli::{Common, ThemeCommands};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::settings::{Sensitivity, Settings, StatusPalette, ThemeMode, Theming};
use crate::task::StatusColor;
use crate::theme::{self, ComplementaryPalette};

const STATUSES: [StatusColor; 5] = [
    StatusColor::Blue,
    StatusColor::Green,
    StatusColor::Yellow,
    StatusColor::Red,
    StatusColor::Black,
];

pub fn run(command: ThemeCommands, common: Common) -> Result<()> {
    match command {
        ThemeCommands::Show => run_show(common),
        ThemeCommands::Set {
            enable,
            disable,
            base,
            mode,
            theme_status,
            color,
            name,
            sensitivity,
            adaptive,
            clock24,
        } => run_set(SetOptions {
            enable,
            disable,
            base,
            mode,
            theme_status,
            colors: color,
            names: name,
            sensitivity,
            adaptive,
            clock24,
            common,
        }),
        ThemeCommands::Reset => run_reset(common),
    }
}

pub struct SetOptions {
    pub enable: bool,
    pub disable: bool,
    pub base: Option<String>,
    pub mode: Option<String>,
    pub theme_status: Option<bool>,
    pub colors: Vec<String>,
    pub names: Vec<String>,
    pub sensitivity: Option<f64>,
    pub adaptive: bool,
    pub clock24: Option<bool>,
    pub common: Common,
}

impl SetOptions {
    fn is_empty(&self) -> bool {
        !self.enable
            && !self.disable
            && self.base.is_none()
            && self.mode.is_none()
            && self.theme_status.is_none()
            && self.colors.is_empty()
            && self.names.is_empty()
            && self.sensitivity.is_none()
            && !self.adaptive
            && self.clock24.is_none()
    }
}

#[derive(Serialize)]
struct ThemeOutput<'a> {
    theming: &'a Theming,
    status_colors: StatusPalette,
    status_names: &'a StatusPalette,
    #[serde(skip_serializing_if = "Option::is_none")]
    palette: Option<ComplementaryPalette>,
    sensitivity: Sensitivity,
    use_24_hour_format: bool,
}

fn theme_output(settings: &Settings) -> ThemeOutput<'_> {
    let palette = if settings.theming.enabled {
        theme::complementary_palette(&settings.theming.base_color, settings.theming.mode).ok()
    } else {
        None
    };
    ThemeOutput {
        theming: &settings.theming,
        status_colors: theme::resolved_status_colors(settings),
        status_names: &settings.status_names,
        palette,
        sensitivity: settings.sensitivity,
        use_24_hour_format: settings.app.use_24_hour_format,
    }
}

fn describe(human: &mut HumanOutput, output: &ThemeOutput<'_>) {
    human.push_summary(
        "Theming",
        if output.theming.enabled {
            format!("on, base {} ({})", output.theming.base_color, output.theming.mode.as_str())
        } else {
            "off".to_string()
        },
    );
    human.push_summary(
        "Sensitivity",
        if output.sensitivity.is_adaptive {
            format!("adaptive ({:.2})", output.sensitivity.s_value)
        } else {
            format!("{:.2}", output.sensitivity.s_value)
        },
    );
    human.push_summary(
        "Clock",
        if output.use_24_hour_format { "24-hour" } else { "12-hour" },
    );
    for status in STATUSES {
        let color = output.status_colors.get(status);
        let text = theme::contrasting_text(color);
        human.push_detail(format!(
            "{:<6} {}  {}  text {}",
            status.as_str(),
            color,
            output.status_names.get(status),
            text.primary
        ));
    }
    if let Some(palette) = &output.palette {
        human.push_detail(format!(
            "palette main {} secondary {} tertiary {} accents {}",
            palette.main,
            palette.secondary,
            palette.tertiary,
            palette.accents().join(" ")
        ));
    }
}

pub fn run_show(common: Common) -> Result<()> {
    let (planner, _) = common.open_read_only()?;
    let output = theme_output(&planner.settings);
    let mut human = HumanOutput::new("Theme");
    describe(&mut human, &output);
    emit_success(common.output(), "theme show", &output, Some(&human))
}

/// Split `status=value` pairs.
fn parse_status_pair(raw: &str) -> Result<(StatusColor, String)> {
    let (status, value) = raw.split_once('=').ok_or_else(|| {
        Error::InvalidArgument(format!("invalid '{raw}' (expected <status>=<value>)"))
    })?;
    let status = StatusColor::parse(status.trim()).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "invalid status '{status}' (expected blue|green|yellow|red|black)"
        ))
    })?;
    Ok((status, value.trim().to_string()))
}

pub fn run_set(options: SetOptions) -> Result<()> {
    if options.is_empty() {
        return Err(Error::InvalidArgument(
            "no changes specified; see planner theme set --help".to_string(),
        ));
    }
    let mode = options
        .mode
        .as_deref()
        .map(|raw| {
            ThemeMode::parse(raw).ok_or_else(|| {
                Error::InvalidArgument(format!("invalid mode '{raw}' (expected night|light|auto)"))
            })
        })
        .transpose()?;
    let base = options.base.as_deref().map(theme::validate_hex).transpose()?;
    if let Some(value) = options.sensitivity {
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidArgument(format!(
                "sensitivity must be within [0, 1], got {value}"
            )));
        }
    }
    let colors = options
        .colors
        .iter()
        .map(|raw| {
            let (status, value) = parse_status_pair(raw)?;
            Ok((status, theme::validate_hex(&value)?))
        })
        .collect::<Result<Vec<_>>>()?;
    let names = options
        .names
        .iter()
        .map(|raw| parse_status_pair(raw))
        .collect::<Result<Vec<_>>>()?;

    let (mut planner, now) = options.common.open()?;
    let settings = &mut planner.settings;
    if options.enable {
        settings.theming.enabled = true;
    }
    if options.disable {
        settings.theming.enabled = false;
    }
    if let Some(base) = base {
        settings.theming.base_color = base;
    }
    if let Some(mode) = mode {
        settings.theming.mode = mode;
    }
    if let Some(theme_status) = options.theme_status {
        settings.theming.use_theme_for_status = theme_status;
    }
    for (status, color) in colors {
        settings.status_colors.set(status, color);
    }
    for (status, name) in names {
        if name.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "status name for {} cannot be empty",
                status.as_str()
            )));
        }
        settings.status_names.set(status, name);
    }
    if let Some(value) = options.sensitivity {
        settings.sensitivity = Sensitivity {
            s_value: value,
            is_adaptive: false,
        };
    }
    if options.adaptive {
        settings.sensitivity.is_adaptive = true;
    }
    if let Some(clock24) = options.clock24 {
        settings.app.use_24_hour_format = clock24;
    }
    // Sensitivity feeds status colours.
    planner.refresh(now);
    planner.save(now)?;

    let output = theme_output(&planner.settings);
    let mut human = HumanOutput::new("Theme updated");
    describe(&mut human, &output);
    emit_success(options.common.output(), "theme set", &output, Some(&human))
}

pub fn run_reset(common: Common) -> Result<()> {
    let (mut planner, now) = common.open()?;
    planner.settings.theming = Theming::default();
    planner.settings.status_colors = StatusPalette::default_colors();
    planner.settings.status_names = StatusPalette::default_names();
    planner.save(now)?;

    let output = theme_output(&planner.settings);
    let mut human = HumanOutput::new("Theme reset");
    describe(&mut human, &output);
    emit_success(common.output(), "theme reset", &output, Some(&human))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_pairs_split_on_equals() {
        let (status, value) = parse_status_pair("red= #ff0000").unwrap();
        assert_eq!(status, StatusColor::Red);
        assert_eq!(value, "#ff0000");
        assert!(parse_status_pair("red").is_err());
        assert!(parse_status_pair("pink=#fff").is_err());
    }
}
