//! RetroArch playlist builder
//!
//! Static table of the platforms the device frontend knows: the libretro
//! core each one launches with, the database name the frontend matches
//! playlists against, and the directory the core keeps saves in.

use retrosync_core::domain::{base_name, SyncTarget};
use retrosync_core::ports::{IPlaylistMaterializer, PlaylistDocument, PlaylistEntry, PlaylistError};

/// Where the device frontend finds pushed ROMs
pub const DEVICE_ROM_PREFIX: &str = "~/Library/Caches/RetroArch/downloads";

const PLAYLIST_VERSION: &str = "1.5";

/// Per-platform core and playlist metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    pub short_name: &'static str,
    /// Catalog display name, the key for playlist file names
    pub full_name: &'static str,
    /// Directory under `saves/` and `states/` used by the core
    pub core_directory: &'static str,
    pub core_path: &'static str,
    pub core_name: &'static str,
    /// Database playlist name, also the playlist file name
    pub db_name: &'static str,
}

macro_rules! profile {
    ($short:literal, $full:literal, $core_dir:literal, $core:literal, $db:literal) => {
        PlatformProfile {
            short_name: $short,
            full_name: $full,
            core_directory: $core_dir,
            core_path: concat!(":/Frameworks/", $core_dir, "_libretro.framework"),
            core_name: $core,
            db_name: $db,
        }
    };
}

/// Every platform with a known core
#[rustfmt::skip]
pub const PLATFORMS: &[PlatformProfile] = &[
    // Nintendo
    profile!("nes", "Nintendo Entertainment System", "nestopia",
        "Nintendo - NES / Famicom (Nestopia UE)", "Nintendo - Nintendo Entertainment System.lpl"),
    profile!("snes", "Super Nintendo Entertainment System", "snes9x",
        "Nintendo - SNES / SFC (Snes9x)", "Nintendo - Super Nintendo Entertainment System.lpl"),
    profile!("n64", "Nintendo 64", "mupen64plus_next",
        "Nintendo - Nintendo 64 (Mupen64Plus-Next)", "Nintendo - Nintendo 64.lpl"),
    profile!("gba", "Game Boy Advance", "mgba",
        "Nintendo - Game Boy Advance (mGBA)", "Nintendo - Game Boy Advance.lpl"),
    profile!("gbc", "Game Boy Color", "gambatte",
        "Nintendo - Game Boy Color (Gambatte)", "Nintendo - Game Boy Color.lpl"),
    profile!("gb", "Game Boy", "gambatte",
        "Nintendo - Game Boy (Gambatte)", "Nintendo - Game Boy.lpl"),
    profile!("nds", "Nintendo DS", "desmume",
        "Nintendo - Nintendo DS (DeSmuME)", "Nintendo - Nintendo DS.lpl"),
    profile!("gamecube", "GameCube", "dolphin",
        "Nintendo - GameCube (Dolphin)", "Nintendo - GameCube.lpl"),
    profile!("gw", "Game & Watch", "gw",
        "Nintendo - Game & Watch (gw)", "Nintendo - Game & Watch.lpl"),
    // Sega
    profile!("genesis", "Sega Genesis", "genesis_plus_gx",
        "Sega - Mega Drive - Genesis (Genesis Plus GX)", "Sega - Mega Drive - Genesis.lpl"),
    profile!("mastersystem", "Sega Master System", "genesis_plus_gx",
        "Sega - Master System - Mark III (Genesis Plus GX)", "Sega - Master System - Mark III.lpl"),
    profile!("gamegear", "Sega Game Gear", "genesis_plus_gx",
        "Sega - Game Gear (Genesis Plus GX)", "Sega - Game Gear.lpl"),
    profile!("dreamcast", "Sega Dreamcast", "flycast",
        "Sega - Dreamcast (Flycast)", "Sega - Dreamcast.lpl"),
    profile!("saturn", "Sega Saturn", "mednafen_saturn",
        "Sega - Saturn (Beetle Saturn)", "Sega - Saturn.lpl"),
    // Sony
    profile!("ps1", "PlayStation", "mednafen_psx_hw",
        "Sony - PlayStation (Beetle PSX HW)", "Sony - PlayStation.lpl"),
    profile!("ps2", "PlayStation 2", "pcsx2",
        "Sony - PlayStation 2 (PCSX2)", "Sony - PlayStation 2.lpl"),
    profile!("psp", "PlayStation Portable", "ppsspp",
        "Sony - PlayStation Portable (PPSSPP)", "Sony - PlayStation Portable.lpl"),
    // Arcade
    profile!("arcade", "Arcade", "mame", "MAME", "MAME.lpl"),
    profile!("neogeo", "Neo Geo", "fbneo",
        "SNK - Neo Geo (FinalBurn Neo)", "SNK - Neo Geo.lpl"),
    profile!("cps1", "CPS-1", "fbneo",
        "Capcom - CPS-1 (FinalBurn Neo)", "Capcom - CPS-1.lpl"),
    profile!("cps2", "CPS-2", "fbneo",
        "Capcom - CPS-2 (FinalBurn Neo)", "Capcom - CPS-2.lpl"),
    // Atari
    profile!("atari2600", "Atari 2600", "stella",
        "Atari - 2600 (Stella)", "Atari - 2600.lpl"),
    profile!("atari7800", "Atari 7800", "prosystem",
        "Atari - 7800 (ProSystem)", "Atari - 7800.lpl"),
];

/// Case-insensitive lookup by platform short name
pub fn profile_for(short_name: &str) -> Option<&'static PlatformProfile> {
    PLATFORMS
        .iter()
        .find(|p| p.short_name.eq_ignore_ascii_case(short_name))
}

/// [`IPlaylistMaterializer`] backed by [`PLATFORMS`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RetroArchPlaylists;

impl RetroArchPlaylists {
    pub fn new() -> Self {
        Self
    }

    fn entry(profile: &PlatformProfile, rom: &SyncTarget) -> PlaylistEntry {
        let label = if rom.title.trim().is_empty() {
            base_name(&rom.device_file_name).to_string()
        } else {
            rom.title.clone()
        };

        PlaylistEntry {
            path: format!("{DEVICE_ROM_PREFIX}/{}", rom.device_file_name),
            label,
            core_path: profile.core_path.to_string(),
            core_name: profile.core_name.to_string(),
            crc32: "DETECT|crc".to_string(),
            db_name: profile.db_name.to_string(),
        }
    }
}

impl IPlaylistMaterializer for RetroArchPlaylists {
    fn build(
        &self,
        platform_short_name: &str,
        roms: &[SyncTarget],
    ) -> Result<PlaylistDocument, PlaylistError> {
        let profile = profile_for(platform_short_name)
            .ok_or_else(|| PlaylistError::UnknownPlatform(platform_short_name.to_string()))?;

        Ok(PlaylistDocument {
            version: PLAYLIST_VERSION.to_string(),
            default_core_path: profile.core_path.to_string(),
            default_core_name: profile.core_name.to_string(),
            label_display_mode: 0,
            right_thumbnail_mode: 0,
            left_thumbnail_mode: 0,
            sort_mode: 0,
            items: roms.iter().map(|rom| Self::entry(profile, rom)).collect(),
        })
    }

    fn filename_for(&self, platform_name: &str) -> String {
        PLATFORMS
            .iter()
            .find(|p| p.full_name == platform_name)
            .map(|p| p.db_name.to_string())
            .unwrap_or_else(|| format!("{platform_name}.lpl"))
    }

    fn core_directory_for(&self, platform_short_name: &str) -> Option<String> {
        profile_for(platform_short_name).map(|p| p.core_directory.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrosync_core::domain::{ContentHash, PlatformId, RomId};
    use std::path::PathBuf;

    fn target(id: i64, title: &str, file: &str) -> SyncTarget {
        SyncTarget {
            id: RomId::new(id),
            title: title.to_string(),
            platform_id: PlatformId::new(2),
            platform_short_name: "snes".to_string(),
            platform_name: "Super Nintendo Entertainment System".to_string(),
            core_directory: Some("snes9x".to_string()),
            content_hash: ContentHash::new(format!("hash{id}")).unwrap(),
            local_file_path: PathBuf::from(format!("/roms/{file}")),
            device_file_name: file.to_string(),
        }
    }

    #[test]
    fn test_table_has_every_platform_once() {
        assert_eq!(PLATFORMS.len(), 23);
        let mut names: Vec<_> = PLATFORMS.iter().map(|p| p.short_name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 23);
    }

    #[test]
    fn test_build_snes_playlist() {
        let doc = RetroArchPlaylists
            .build(
                "SNES",
                &[
                    target(1, "Super Mario World", "mario.sfc"),
                    target(2, "", "zelda.sfc"),
                ],
            )
            .unwrap();

        assert_eq!(doc.version, "1.5");
        assert_eq!(doc.default_core_path, ":/Frameworks/snes9x_libretro.framework");
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].path, "~/Library/Caches/RetroArch/downloads/mario.sfc");
        assert_eq!(doc.items[0].label, "Super Mario World");
        assert_eq!(doc.items[0].crc32, "DETECT|crc");
        assert_eq!(doc.items[1].label, "zelda");
        assert_eq!(doc.items[1].db_name, "Nintendo - Super Nintendo Entertainment System.lpl");
    }

    #[test]
    fn test_build_unknown_platform() {
        let err = RetroArchPlaylists.build("vectrex", &[]).unwrap_err();
        assert_eq!(err, PlaylistError::UnknownPlatform("vectrex".to_string()));
    }

    #[test]
    fn test_filename_for() {
        let p = RetroArchPlaylists;
        assert_eq!(
            p.filename_for("Super Nintendo Entertainment System"),
            "Nintendo - Super Nintendo Entertainment System.lpl"
        );
        assert_eq!(p.filename_for("Arcade"), "MAME.lpl");
        assert_eq!(p.filename_for("Vectrex"), "Vectrex.lpl");
    }

    #[test]
    fn test_core_directory_for() {
        let p = RetroArchPlaylists;
        assert_eq!(p.core_directory_for("snes").as_deref(), Some("snes9x"));
        assert_eq!(p.core_directory_for("GB").as_deref(), Some("gambatte"));
        assert_eq!(p.core_directory_for("vectrex"), None);
    }

    #[test]
    fn test_document_serializes_with_frontend_keys() {
        let doc = RetroArchPlaylists.build("gba", &[]).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(json["default_core_name"], "Nintendo - Game Boy Advance (mGBA)");
        assert_eq!(json["label_display_mode"], 0);
        assert!(json["items"].as_array().unwrap().is_empty());
    }
}
