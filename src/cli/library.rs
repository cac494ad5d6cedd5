use std::sync::Arc;

use tabled::Table;

use crate::{
    cli::{catalog, fail, format_ms, spinner},
    info,
    spotify::auth::AuthFlow,
    types::{
        Album, AlbumTableRow, PlaylistTableRow, SearchKind, SimplifiedAlbum, SimplifiedArtist,
        SimplifiedPlaylist, Track, TrackTableRow,
    },
    warning,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SavedKind {
    Tracks,
    Albums,
}

pub async fn playlists(auth: Arc<AuthFlow>, limit: u32, offset: u32) {
    let pb = spinner("Loading playlists...");
    let page = catalog(&auth).playlists(limit, offset).await;
    pb.finish_and_clear();

    let page = page.unwrap_or_else(|e| fail("Failed to load playlists", e));
    if page.items.is_empty() {
        warning!("No playlists found");
        return;
    }

    let rows: Vec<PlaylistTableRow> = page.items.iter().map(playlist_row).collect();
    println!("{}", Table::new(rows));
    info!("Showing {} of {} playlists", page.items.len(), page.total);
}

pub async fn tracks(auth: Arc<AuthFlow>, playlist_id: String, limit: u32, offset: u32) {
    let catalog = catalog(&auth);

    let pb = spinner("Loading playlist...");
    let result = tokio::try_join!(
        catalog.playlist(&playlist_id),
        catalog.playlist_tracks(&playlist_id, limit, offset)
    );
    pb.finish_and_clear();

    let (playlist, page) = result.unwrap_or_else(|e| fail("Failed to load playlist", e));
    let rows: Vec<TrackTableRow> = page
        .items
        .iter()
        .filter_map(|item| item.track.as_ref())
        .map(track_row)
        .collect();

    if rows.is_empty() {
        warning!("Playlist {} has no playable tracks", playlist.name);
        return;
    }

    println!("{}\n{}", playlist.name, Table::new(rows));
    info!("Showing {} of {} tracks", page.items.len(), page.total);
}

pub async fn search(auth: Arc<AuthFlow>, query: String, kinds: Vec<SearchKind>, limit: u32) {
    let pb = spinner("Searching...");
    let results = catalog(&auth).search(&query, &kinds, limit).await;
    pb.finish_and_clear();

    let results = results.unwrap_or_else(|e| fail("Search failed", e));
    let mut found = false;

    if let Some(tracks) = results.tracks.filter(|p| !p.items.is_empty()) {
        found = true;
        let rows: Vec<TrackTableRow> = tracks.items.iter().map(track_row).collect();
        println!("Tracks\n{}\n", Table::new(rows));
    }

    if let Some(albums) = results.albums.filter(|p| !p.items.is_empty()) {
        found = true;
        let rows: Vec<AlbumTableRow> = albums.items.iter().map(simplified_album_row).collect();
        println!("Albums\n{}\n", Table::new(rows));
    }

    if let Some(artists) = results.artists.filter(|p| !p.items.is_empty()) {
        found = true;
        for artist in artists.items {
            let genres = artist.genres.iter().take(3).cloned().collect::<Vec<_>>();
            if genres.is_empty() {
                println!("{}  {}", artist.name, artist.uri);
            } else {
                println!("{} ({})  {}", artist.name, genres.join(", "), artist.uri);
            }
        }
        println!();
    }

    if let Some(playlists) = results.playlists {
        let rows: Vec<PlaylistTableRow> =
            playlists.items.iter().flatten().map(playlist_row).collect();
        if !rows.is_empty() {
            found = true;
            println!("Playlists\n{}\n", Table::new(rows));
        }
    }

    if !found {
        warning!("Nothing found for \"{}\"", query);
    }
}

pub async fn saved(auth: Arc<AuthFlow>, kind: SavedKind, limit: u32, offset: u32) {
    let catalog = catalog(&auth);
    let pb = spinner("Loading your library...");

    match kind {
        SavedKind::Tracks => {
            let page = catalog.saved_tracks(limit, offset).await;
            pb.finish_and_clear();
            let page = page.unwrap_or_else(|e| fail("Failed to load saved tracks", e));
            if page.items.is_empty() {
                warning!("No saved tracks");
                return;
            }
            let rows: Vec<TrackTableRow> = page.items.iter().map(|s| track_row(&s.track)).collect();
            println!("{}", Table::new(rows));
            info!("Showing {} of {} saved tracks", page.items.len(), page.total);
        }
        SavedKind::Albums => {
            let page = catalog.saved_albums(limit, offset).await;
            pb.finish_and_clear();
            let page = page.unwrap_or_else(|e| fail("Failed to load saved albums", e));
            if page.items.is_empty() {
                warning!("No saved albums");
                return;
            }
            let rows: Vec<AlbumTableRow> = page.items.iter().map(|s| album_row(&s.album)).collect();
            println!("{}", Table::new(rows));
            info!("Showing {} of {} saved albums", page.items.len(), page.total);
        }
    }
}

fn playlist_row(playlist: &SimplifiedPlaylist) -> PlaylistTableRow {
    PlaylistTableRow {
        name: playlist.name.clone(),
        tracks: playlist.tracks.as_ref().map(|t| t.total).unwrap_or(0),
        owner: playlist
            .owner
            .display_name
            .clone()
            .unwrap_or_else(|| playlist.owner.id.clone()),
        uri: playlist.uri.clone(),
    }
}

fn track_row(track: &Track) -> TrackTableRow {
    TrackTableRow {
        name: track.name.clone(),
        artists: artist_names(&track.artists),
        duration: format_ms(track.duration_ms),
        uri: track.uri.clone(),
    }
}

fn album_row(album: &Album) -> AlbumTableRow {
    AlbumTableRow {
        name: album.name.clone(),
        artists: artist_names(&album.artists),
        released: album.release_date.clone().unwrap_or_default(),
        uri: album.uri.clone(),
    }
}

fn simplified_album_row(album: &SimplifiedAlbum) -> AlbumTableRow {
    AlbumTableRow {
        name: album.name.clone(),
        artists: artist_names(&album.artists),
        released: album.release_date.clone().unwrap_or_default(),
        uri: album.uri.clone().unwrap_or_default(),
    }
}

fn artist_names(artists: &[SimplifiedArtist]) -> String {
    artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
