//! Executable build identification from fixed byte windows.
//!
//! Every known build of the game executable carries a distinguishing byte
//! pattern at one of a handful of fixed offsets. [`classify`] reads a
//! 15-byte window at each offset in [`SIGNATURE_OFFSETS`] and walks an
//! ordered list of predicates; the first match wins, so the order of the
//! checks encodes precedence between overlapping signatures.

use crate::error::Result;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom};

/// Size of every signature window in bytes.
pub const WINDOW_SIZE: usize = 15;

/// Offset of the version string in 1.02 (no-CD) and all community builds.
pub const VERSION_BYTES_102_NOCD: u64 = 0x005F_1C2B;
/// Offset of the version string in the DRM-free 1.03 build.
pub const VERSION_BYTES_103_NOCD: u64 = 0x005F_8C27;
/// Offset of the StarForce 1.0 signature.
pub const VERSION_BYTES_100_STAR: u64 = 0x0059_AB11;
/// Offset of the StarForce 1.02 signature.
pub const VERSION_BYTES_102_STAR: u64 = 0x0118_C4A0;
/// Offset of the StarForce 1.03 signature.
pub const VERSION_BYTES_103_STAR: u64 = 0x0125_8160;
/// Offset of the old DEM launcher signature.
pub const VERSION_BYTES_DEM_LNCH: u64 = 0x0000_D2A0;

/// All offsets read by [`classify`], in read order.
pub const SIGNATURE_OFFSETS: [u64; 6] = [
    VERSION_BYTES_102_NOCD,
    VERSION_BYTES_103_NOCD,
    VERSION_BYTES_100_STAR,
    VERSION_BYTES_102_STAR,
    VERSION_BYTES_103_STAR,
    VERSION_BYTES_DEM_LNCH,
];

const STAR_102_MAGIC: &[u8] = b"O0\x87\xfa%\xbc\x9f\x86Q";
const STAR_103_MAGIC: &[u8] = b"\xbf\xcf\x966\xf1\x97\xf2\xc5\x11";
const DEM_LAUNCHER_MAGIC: &[u8] = b"\x00\x8dU\x98R\xe8)\x07\x00";

/// Minor versions shipped by the community patch and remaster (`1.10`..`1.14`).
const COMMUNITY_MINORS: [(u8, &[u8]); 5] = [
    (10, b"1.10"),
    (11, b"1.11"),
    (12, b"1.12"),
    (13, b"1.13"),
    (14, b"1.14"),
];

/// Resolved build of a game executable.
///
/// `Unknown` is a valid classification: it names a compatibility tier that
/// simply fails later checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExeVersion {
    Clean102,
    DrmFree103,
    /// Community patch build; `minor` is 10 for `1.10`.
    ComPatch { minor: u8 },
    ComPatchMini,
    /// Community remaster build; `minor` is 10 for `1.10`.
    ComRemaster { minor: u8 },
    Krbdzskl104,
    Starforce100,
    Starforce102,
    Starforce103,
    OldDemLauncher,
    Unknown,
}

impl ExeVersion {
    /// Whether community content can be installed on top of this build.
    pub fn is_compatch_compatible(&self) -> bool {
        matches!(
            self,
            ExeVersion::Clean102
                | ExeVersion::ComPatch { .. }
                | ExeVersion::ComPatchMini
                | ExeVersion::ComRemaster { .. }
        )
    }

    /// Whether the executable already carries the community patch or remaster.
    pub fn is_patched(&self) -> bool {
        matches!(
            self,
            ExeVersion::ComPatch { .. } | ExeVersion::ComPatchMini | ExeVersion::ComRemaster { .. }
        )
    }

    pub fn is_remaster(&self) -> bool {
        matches!(self, ExeVersion::ComRemaster { .. })
    }

    /// Compact label for lists, e.g. `ComRem 1.12`.
    pub fn short_label(&self) -> String {
        self.to_string().replace("Remaster", "Rem")
    }

    /// Which game of the series this executable belongs to.
    pub fn installment(&self) -> GameInstallment {
        GameInstallment::from_exe_label(&self.to_string())
    }
}

impl fmt::Display for ExeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExeVersion::Clean102 => f.write_str("Clean 1.02"),
            ExeVersion::DrmFree103 => f.write_str("DRM Free 1.03"),
            ExeVersion::ComPatch { minor } => write!(f, "ComPatch 1.{minor}"),
            ExeVersion::ComPatchMini => f.write_str("ComPatch Mini"),
            ExeVersion::ComRemaster { minor } => write!(f, "ComRemaster 1.{minor}"),
            ExeVersion::Krbdzskl104 => f.write_str("KRBDZSKL 1.04"),
            ExeVersion::Starforce100 => f.write_str("1.0 Starforce"),
            ExeVersion::Starforce102 => f.write_str("1.02 Starforce"),
            ExeVersion::Starforce103 => f.write_str("1.03 Starforce"),
            ExeVersion::OldDemLauncher => f.write_str("Old DEM launcher"),
            ExeVersion::Unknown => f.write_str("Unknown"),
        }
    }
}

/// The game of the series a copy or a mod belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameInstallment {
    #[default]
    ExMachina,
    M113,
    Arcade,
    Unknown,
}

impl GameInstallment {
    /// Identifier used in manifests (`exmachina`, `m113`, `arcade`).
    pub fn as_str(&self) -> &'static str {
        match self {
            GameInstallment::ExMachina => "exmachina",
            GameInstallment::M113 => "m113",
            GameInstallment::Arcade => "arcade",
            GameInstallment::Unknown => "unknown",
        }
    }

    /// Parses a manifest identifier; unrecognised values map to `Unknown`.
    pub fn from_id(id: &str) -> Self {
        match id {
            "exmachina" => GameInstallment::ExMachina,
            "m113" => GameInstallment::M113,
            "arcade" => GameInstallment::Arcade,
            _ => GameInstallment::Unknown,
        }
    }

    fn from_exe_label(label: &str) -> Self {
        if label == "Unknown" {
            GameInstallment::Unknown
        } else if label.contains("M113") {
            GameInstallment::M113
        } else if label.contains("Arcade") {
            GameInstallment::Arcade
        } else {
            GameInstallment::ExMachina
        }
    }
}

impl fmt::Display for GameInstallment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw byte windows read from one executable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureWindows {
    pub nocd_102: Vec<u8>,
    pub nocd_103: Vec<u8>,
    pub star_100: Vec<u8>,
    pub star_102: Vec<u8>,
    pub star_103: Vec<u8>,
    pub dem_launcher: Vec<u8>,
}

impl SignatureWindows {
    /// Reads every window from a seekable stream.
    ///
    /// Windows past the end of the stream come back short (or empty) and
    /// simply never match a pattern.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            nocd_102: read_window(reader, VERSION_BYTES_102_NOCD)?,
            nocd_103: read_window(reader, VERSION_BYTES_103_NOCD)?,
            star_100: read_window(reader, VERSION_BYTES_100_STAR)?,
            star_102: read_window(reader, VERSION_BYTES_102_STAR)?,
            star_103: read_window(reader, VERSION_BYTES_103_STAR)?,
            dem_launcher: read_window(reader, VERSION_BYTES_DEM_LNCH)?,
        })
    }

    /// Resolves the windows to a build; first matching predicate wins.
    pub fn resolve(&self) -> ExeVersion {
        let nocd = self.nocd_102.as_slice();

        if slice_is(nocd, 8..12, b"1.02") {
            return ExeVersion::Clean102;
        }
        if slice_is(&self.nocd_103, 1..5, b"1.03") {
            return ExeVersion::DrmFree103;
        }
        for (minor, pattern) in COMMUNITY_MINORS {
            if slice_is(nocd, 0..4, pattern) {
                return ExeVersion::ComPatch { minor };
            }
        }
        if slice_is(nocd, 0..4, b"1.02") {
            return ExeVersion::ComPatchMini;
        }
        for (minor, pattern) in COMMUNITY_MINORS {
            if slice_is(nocd, 3..7, pattern) {
                return ExeVersion::ComRemaster { minor };
            }
        }
        if slice_is(nocd, 8..12, b"1.04") {
            return ExeVersion::Krbdzskl104;
        }
        if slice_is(&self.star_100, 1..5, b"1.0 ") {
            return ExeVersion::Starforce100;
        }
        if self.star_102.starts_with(STAR_102_MAGIC) {
            return ExeVersion::Starforce102;
        }
        if self.star_103.starts_with(STAR_103_MAGIC) {
            return ExeVersion::Starforce103;
        }
        if self.dem_launcher.starts_with(DEM_LAUNCHER_MAGIC) {
            return ExeVersion::OldDemLauncher;
        }
        ExeVersion::Unknown
    }
}

fn slice_is(window: &[u8], range: std::ops::Range<usize>, expected: &[u8]) -> bool {
    window.get(range) == Some(expected)
}

fn read_window<R: Read + Seek>(reader: &mut R, offset: u64) -> io::Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut window = Vec::with_capacity(WINDOW_SIZE);
    reader.by_ref().take(WINDOW_SIZE as u64).read_to_end(&mut window)?;
    Ok(window)
}

/// Classifies an executable from a seekable stream.
pub fn classify<R: Read + Seek>(reader: &mut R) -> io::Result<ExeVersion> {
    Ok(SignatureWindows::read_from(reader)?.resolve())
}

/// Opens and classifies the executable at `path`.
///
/// The file is opened for writing as well as reading: a running game holds
/// its executable locked, and that is reported as `Ok(None)` rather than an
/// error so the caller can ask the user to close the game.
pub fn probe_exe_version(path: &Utf8Path) -> Result<Option<ExeVersion>> {
    let mut file = match OpenOptions::new()
        .read(true)
        .write(true)
        .open(path.as_std_path())
    {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            tracing::warn!("Executable is locked, assuming the game is running: {}", path);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let version = classify(&mut file)?;
    tracing::debug!("Classified {} as '{}'", path, version);
    Ok(Some(version))
}
