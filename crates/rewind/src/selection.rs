use std::collections::HashSet;

use log::{debug, warn};
use rewind_backend::compare_versions;
use rewind_downgrade::AppDiff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionOptions {
    pub auto_downgrade: bool,
    pub allow_downgrade: bool,
    pub expert_mode: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            auto_downgrade: true,
            allow_downgrade: true,
            expert_mode: false,
        }
    }
}

/// Which version to patch, decided before any download starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelection {
    /// Patch the installed version as-is.
    UseCurrent,
    Downgrade(AppDiff),
    /// The host has to ask. `current` is set when staying on the installed
    /// version is one of the choices; it is listed before `candidates`.
    Choose {
        current: Option<String>,
        candidates: Vec<AppDiff>,
    },
    /// Neither the installed version nor any reachable version has core mods.
    Unavailable,
}

/// Pick the version to move to from `current_version`.
///
/// `paths` are the transitions available from the installed version and
/// `versions_with_core_mods` the game versions with published core mods.
#[must_use]
pub fn select_target(
    current_version: &str,
    current_has_core_mods: bool,
    paths: &[AppDiff],
    versions_with_core_mods: &HashSet<String>,
    options: SelectionOptions,
) -> TargetSelection {
    if !options.allow_downgrade {
        return if current_has_core_mods || options.expert_mode {
            debug!("Downgrading disabled, using current version {current_version}");
            TargetSelection::UseCurrent
        } else {
            warn!("Downgrading disabled and no core mods for {current_version}");
            TargetSelection::Unavailable
        };
    }

    if options.auto_downgrade && current_has_core_mods {
        debug!("Using current version {current_version}");
        return TargetSelection::UseCurrent;
    }

    if options.expert_mode {
        if paths.is_empty() {
            debug!("No downgrade paths from {current_version}, using current version");
            return TargetSelection::UseCurrent;
        }
        debug!("Offering {} versions from {current_version}", paths.len());
        return TargetSelection::Choose {
            current: Some(current_version.to_string()),
            candidates: paths.to_vec(),
        };
    }

    let mut moddable: Vec<AppDiff> = paths
        .iter()
        .filter(|path| versions_with_core_mods.contains(&path.to_version))
        .cloned()
        .collect();
    moddable.sort_by(|a, b| compare_versions(&b.to_version, &a.to_version));

    if moddable.is_empty() {
        if current_has_core_mods {
            return TargetSelection::UseCurrent;
        }
        warn!("No core mods and no moddable downgrades for {current_version}");
        return TargetSelection::Unavailable;
    }

    let offered = moddable.len() + usize::from(current_has_core_mods);
    if options.auto_downgrade || offered == 1 {
        let newest = moddable.swap_remove(0);
        debug!("Selecting newest moddable version {}", newest.to_version);
        return TargetSelection::Downgrade(newest);
    }

    debug!("Offering {offered} moddable versions from {current_version}");
    TargetSelection::Choose {
        current: current_has_core_mods.then(|| current_version.to_string()),
        candidates: moddable,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rewind_downgrade::{AppDiff, FileDiff};

    use super::{SelectionOptions, TargetSelection, select_target};

    const CURRENT: &str = "1.37.0_9064817954";

    fn path(to_version: &str) -> AppDiff {
        AppDiff {
            from_version: CURRENT.to_string(),
            to_version: to_version.to_string(),
            apk_diff: FileDiff {
                diff_name: format!("{to_version}.apk.diff"),
                file_name: "base.apk".to_string(),
                file_crc: 1,
                output_file_name: "base.apk".to_string(),
                output_crc: 2,
                output_size: 3,
            },
            obb_diffs: Vec::new(),
        }
    }

    fn moddable(versions: &[&str]) -> HashSet<String> {
        versions.iter().map(ToString::to_string).collect()
    }

    fn paths() -> Vec<AppDiff> {
        vec![
            path("1.35.0_8016709773"),
            path("1.36.2_7373719935"),
            path("1.28.0_4124311467"),
        ]
    }

    fn manual() -> SelectionOptions {
        SelectionOptions {
            auto_downgrade: false,
            ..SelectionOptions::default()
        }
    }

    #[test]
    fn current_version_wins_when_it_has_core_mods() {
        let selection = select_target(
            CURRENT,
            true,
            &paths(),
            &moddable(&["1.35.0_8016709773"]),
            SelectionOptions::default(),
        );

        assert_eq!(selection, TargetSelection::UseCurrent);
    }

    #[test]
    fn auto_downgrade_picks_newest_moddable_target() {
        let selection = select_target(
            CURRENT,
            false,
            &paths(),
            &moddable(&["1.35.0_8016709773", "1.28.0_4124311467"]),
            SelectionOptions::default(),
        );

        let TargetSelection::Downgrade(diff) = selection else {
            panic!("expected a downgrade");
        };
        assert_eq!(diff.to_version, "1.35.0_8016709773");
    }

    #[test]
    fn nothing_moddable_is_unavailable() {
        let selection = select_target(
            CURRENT,
            false,
            &paths(),
            &moddable(&["1.20.0_1"]),
            SelectionOptions::default(),
        );

        assert_eq!(selection, TargetSelection::Unavailable);
    }

    #[test]
    fn manual_mode_offers_current_first_then_newest_targets() {
        let selection = select_target(
            CURRENT,
            true,
            &paths(),
            &moddable(&["1.28.0_4124311467", "1.36.2_7373719935"]),
            manual(),
        );

        let TargetSelection::Choose {
            current,
            candidates,
        } = selection
        else {
            panic!("expected a choice");
        };
        assert_eq!(current.as_deref(), Some(CURRENT));
        let targets: Vec<&str> = candidates.iter().map(|c| c.to_version.as_str()).collect();
        assert_eq!(targets, vec!["1.36.2_7373719935", "1.28.0_4124311467"]);
    }

    #[test]
    fn single_moddable_option_needs_no_choice() {
        let selection = select_target(
            CURRENT,
            false,
            &paths(),
            &moddable(&["1.28.0_4124311467"]),
            manual(),
        );

        assert!(matches!(
            selection,
            TargetSelection::Downgrade(ref diff) if diff.to_version == "1.28.0_4124311467"
        ));

        let stay = select_target(CURRENT, true, &paths(), &moddable(&[]), manual());
        assert_eq!(stay, TargetSelection::UseCurrent);
    }

    #[test]
    fn expert_mode_offers_every_path_regardless_of_core_mods() {
        let options = SelectionOptions {
            auto_downgrade: false,
            expert_mode: true,
            ..SelectionOptions::default()
        };

        let selection = select_target(CURRENT, false, &paths(), &moddable(&[]), options);
        let TargetSelection::Choose {
            current,
            candidates,
        } = selection
        else {
            panic!("expected a choice");
        };
        assert_eq!(current.as_deref(), Some(CURRENT));
        assert_eq!(candidates.len(), 3);

        assert_eq!(
            select_target(CURRENT, false, &[], &moddable(&[]), options),
            TargetSelection::UseCurrent
        );
    }

    #[test]
    fn disallowed_downgrade_never_moves_away() {
        let options = SelectionOptions {
            allow_downgrade: false,
            ..SelectionOptions::default()
        };
        let targets = moddable(&["1.35.0_8016709773"]);

        assert_eq!(
            select_target(CURRENT, true, &paths(), &targets, options),
            TargetSelection::UseCurrent
        );
        assert_eq!(
            select_target(CURRENT, false, &paths(), &targets, options),
            TargetSelection::Unavailable
        );
    }
}
