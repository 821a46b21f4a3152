use std::fmt::Write as _;

use super::selection::FileSelection;
use crate::portal::session::Session;
use crate::portal::storage::{DownloadLink, FileListing, ProgressSnapshot};

pub const PROGRESS_WIDTH: usize = 30;

pub(super) fn render_view(
    session: &Session,
    file: Option<&FileSelection>,
    progress: Option<ProgressSnapshot>,
    download_link: Option<&DownloadLink>,
    listing: &FileListing,
) -> String {
    let mut screen = String::new();
    writeln!(screen, "{}", session.greeting()).expect("write greeting");

    if let Some(file) = file {
        writeln!(
            screen,
            "Selected file: {} ({}, {} bytes)",
            file.name,
            file.content_type,
            file.size()
        )
        .expect("write selection");
    }

    if let Some(progress) = progress {
        writeln!(screen, "Uploading {}", progress.render(PROGRESS_WIDTH))
            .expect("write progress");
    }

    if let Some(link) = download_link {
        match link.expires_at {
            Some(expires_at) => writeln!(
                screen,
                "Download link (expires {}): {}",
                expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
                link.url
            ),
            None => writeln!(screen, "Download link: {}", link.url),
        }
        .expect("write link");
    }

    if listing.is_empty() {
        screen.push_str("No files uploaded yet\n");
    } else {
        screen.push_str("Files\n");
        for item in listing {
            writeln!(screen, "- {}", item.key).expect("write listing entry");
        }
    }

    screen
}
