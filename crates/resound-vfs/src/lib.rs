//! Sandboxed virtual filesystem for streamed audio assets.
//!
//! Assets reach the cache from three kinds of byte source:
//!
//! - **Native files**: plain files below one of the allowed roots
//! - **Archive members**: members of zip-packed directories, served in place
//!   when stored or inflated on first read when deflated
//! - **Disk-image assets**: windows into a fingerprinted disk image whose
//!   asset table maps virtual ranges onto (optionally Yaz0-compressed)
//!   physical ranges
//!
//! All three implement [`ByteSource`]. The [`Filesystem`] resolves
//! `(base_dir, relative_path)` pairs against the configured roots and picks
//! the variant; parsed containers are shared through a [`ContainerCache`].
//!
//! # Example
//!
//! ```rust,ignore
//! use resound_vfs::{ByteSource, Filesystem};
//!
//! let fs = Filesystem::new();
//! fs.set_default_dir("/opt/game/mods");
//! fs.add_allowed_dir("/opt/game/mods");
//!
//! let file = fs.open_file("music.zip", "bgm/title.ogg")?;
//! file.open()?;
//! let mut header = [0u8; 4];
//! file.read_at(0, &mut header)?;
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

pub mod archive;
pub mod container_cache;
pub mod disk_image;
pub mod error;
pub mod file;
pub mod filesystem;
pub mod native;
pub mod path;
pub mod yaz0;

pub use archive::{ArchiveContainer, ArchiveFile};
pub use container_cache::ContainerCache;
pub use disk_image::{DiskImageContainer, DiskImageFile};
pub use error::{VfsError, VfsResult};
pub use file::{ByteSource, VfsFile};
pub use filesystem::Filesystem;
pub use native::NativeFile;
