//! Artifact builders.
//!
//! - [`filesystem`] - directory reset and recursive copy helpers
//! - [`initrd`] - the tar archive loaded as the initial ramdisk
//! - [`iso`] - the bootable ISO, mastered by grub-mkrescue
//! - [`disk`] - the persistent raw disk image attached to the emulator

pub mod disk;
pub mod filesystem;
pub mod initrd;
pub mod iso;
