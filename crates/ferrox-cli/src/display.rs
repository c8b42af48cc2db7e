//! Formatted terminal output

use console::style;
use ferrox_sync::{Checklist, ChecklistAction, ChecklistItem};
use ferrox_types::{FileList, RemoteFile};

/// Format a byte count with a binary unit
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// `ls -l` style permission string
pub fn format_rights(file: &RemoteFile) -> String {
    let kind = if file.is_symlink {
        'l'
    } else if file.is_directory() {
        'd'
    } else {
        '-'
    };
    let Some(rights) = file.rights else {
        return format!("{}?????????", kind);
    };
    let mut text = String::with_capacity(10);
    text.push(kind);
    for shift in [6, 3, 0] {
        let bits = (rights >> shift) & 0o7;
        text.push(if bits & 0o4 == 0 { '-' } else { 'r' });
        text.push(if bits & 0o2 == 0 { '-' } else { 'w' });
        text.push(if bits & 0o1 == 0 { '-' } else { 'x' });
    }
    text
}

/// Short marker and label of a checklist action
pub fn action_label(action: ChecklistAction) -> (&'static str, &'static str) {
    match action {
        ChecklistAction::None => (" ", "none"),
        ChecklistAction::UploadNew => ("→", "upload new"),
        ChecklistAction::UploadUpdate => ("→", "upload update"),
        ChecklistAction::DownloadNew => ("←", "download new"),
        ChecklistAction::DownloadUpdate => ("←", "download update"),
        ChecklistAction::DeleteLocal => ("✗", "delete local"),
        ChecklistAction::DeleteRemote => ("✗", "delete remote"),
    }
}

/// Print a directory listing
pub fn display_listing(list: &FileList) {
    println!("{}", style(list.directory()).bold().underlined());
    for file in list.files() {
        let name = if file.is_directory() {
            style(file.file_name.clone()).blue().bold()
        } else {
            style(file.file_name.clone())
        };
        let target = file
            .link_target
            .as_ref()
            .map(|target| format!(" -> {}", target))
            .unwrap_or_default();
        println!(
            "{} {:>10} {} {}{}",
            format_rights(file),
            format_size(file.size),
            style(file.modification.format("%Y-%m-%d %H:%M:%S")).dim(),
            name,
            target
        );
    }
}

fn item_path(item: &ChecklistItem) -> String {
    match item.action {
        ChecklistAction::UploadNew | ChecklistAction::UploadUpdate | ChecklistAction::DeleteLocal => {
            item.local_path().display().to_string()
        }
        _ => item.remote_path(),
    }
}

/// Print the actions of a synchronization checklist
pub fn display_checklist(checklist: &Checklist) {
    if checklist.is_empty() {
        println!("{} {}", style("✓").green().bold(), "Directories are in sync");
        return;
    }

    for item in checklist.items() {
        let (marker, label) = action_label(item.action);
        let marker = match item.action {
            ChecklistAction::DeleteLocal | ChecklistAction::DeleteRemote => style(marker).red().bold(),
            ChecklistAction::DownloadNew | ChecklistAction::DownloadUpdate => style(marker).cyan().bold(),
            _ => style(marker).green().bold(),
        };
        let checked = if item.checked { "[x]" } else { "[ ]" };
        let suffix = if item.is_directory { "/" } else { "" };
        println!(
            "{} {} {:<16} {}{}",
            checked,
            marker,
            style(label).dim(),
            item_path(item),
            suffix
        );
    }
    println!(
        "{} of {} actions checked",
        style(checklist.checked_count()).bold(),
        checklist.len()
    );
}

/// Print a success line
pub fn display_done(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).bold());
}

/// Print a warning line
pub fn display_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0 B")]
    #[case(1023, "1023 B")]
    #[case(1536, "1.5 KiB")]
    #[case(5 * 1024 * 1024, "5.0 MiB")]
    fn test_format_size(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_size(bytes), expected);
    }

    #[test]
    fn test_format_rights() {
        let mut file = RemoteFile::file("a.txt", 1, Utc::now());
        file.rights = Some(0o754);
        assert_eq!(format_rights(&file), "-rwxr-xr--");

        let mut directory = RemoteFile::directory_entry("dir", Utc::now());
        directory.rights = None;
        assert_eq!(format_rights(&directory), "d?????????");
    }

    #[test]
    fn test_action_labels_are_distinct() {
        let actions = [
            ChecklistAction::UploadNew,
            ChecklistAction::UploadUpdate,
            ChecklistAction::DownloadNew,
            ChecklistAction::DownloadUpdate,
            ChecklistAction::DeleteLocal,
            ChecklistAction::DeleteRemote,
        ];
        let mut labels: Vec<_> = actions.iter().map(|action| action_label(*action).1).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), actions.len());
    }
}
