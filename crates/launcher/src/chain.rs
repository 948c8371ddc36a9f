//! The four stage images as one unit: built from a layout, or read back
//! from a directory of `<stem>.bin` / `<stem>.elf` files.

use std::fs;
use std::path::{Path, PathBuf};

use assembler::{listing, write_elf, BootImage};
use types::{BootLayout, Stage};

use crate::LaunchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootChain {
    layout: BootLayout,
    /// Indexed by [`Stage::index`].
    images: Vec<BootImage>,
}

impl BootChain {
    /// Validates `layout` and assembles every stage for it.
    pub fn build(layout: &BootLayout) -> Result<Self, LaunchError> {
        layout.validate()?;
        let images = Stage::ALL
            .into_iter()
            .map(|stage| bootloader::build_stage(stage, layout))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { layout: *layout, images })
    }

    /// Reads a chain written by [`BootChain::write_to`]. An `.elf` image is
    /// preferred since it keeps the symbols; a bare `.bin` is placed at the
    /// layout's address for its stage.
    pub fn load_from(dir: &Path, layout: &BootLayout) -> Result<Self, LaunchError> {
        layout.validate()?;
        let mut images = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            let image = load_image(dir, stage, layout)?;
            image.check_fits(&layout.region(stage))?;
            images.push(image);
        }
        Ok(Self { layout: *layout, images })
    }

    pub fn layout(&self) -> &BootLayout {
        &self.layout
    }

    pub fn image(&self, stage: Stage) -> &BootImage {
        &self.images[stage.index()]
    }

    pub fn images(&self) -> &[BootImage] {
        &self.images
    }

    /// Looks `name` up in every image.
    pub fn symbol(&self, name: &str) -> Option<u64> {
        self.images.iter().find_map(|image| image.symbol(name))
    }

    /// Name of the symbol at exactly `addr`, in whichever image holds it.
    pub fn symbol_at(&self, addr: u64) -> Option<&str> {
        self.images.iter().find_map(|image| image.symbol_at(addr))
    }

    /// Writes `<stem>.bin` for every stage. With `debug`, also the ELF file,
    /// a disassembly listing and a symbol listing. Returns the written paths.
    pub fn write_to(&self, dir: &Path, debug: bool) -> Result<Vec<PathBuf>, LaunchError> {
        fs::create_dir_all(dir).map_err(|e| LaunchError::io(dir, e))?;
        let mut written = Vec::new();
        for image in &self.images {
            let stem = image.stage.file_stem();
            let mut outputs = vec![(format!("{stem}.bin"), image.to_flat_binary().to_vec())];
            if debug {
                outputs.push((format!("{stem}.elf"), write_elf(image)?));
                outputs.push((format!("{stem}_disasm.txt"), listing::render(image).into_bytes()));
                outputs.push((format!("{stem}_symbols.txt"), listing::symbol_table(image).into_bytes()));
            }
            for (name, bytes) in outputs {
                let path = dir.join(name);
                fs::write(&path, bytes).map_err(|e| LaunchError::io(&path, e))?;
                log::debug!("wrote {}", path.display());
                written.push(path);
            }
            log::info!("built {} ({} bytes at {:#x})", stem, image.len(), image.base);
        }
        Ok(written)
    }
}

fn load_image(dir: &Path, stage: Stage, layout: &BootLayout) -> Result<BootImage, LaunchError> {
    let stem = stage.file_stem();
    let entry = layout.entry(stage);

    let elf_path = dir.join(format!("{stem}.elf"));
    if elf_path.is_file() {
        let bytes = fs::read(&elf_path).map_err(|e| LaunchError::io(&elf_path, e))?;
        let image = BootImage::from_elf(&bytes, stage, layout.region(stage).size).map_err(|source| LaunchError::Elf {
            path: elf_path.clone(),
            source,
        })?;
        if image.base != entry {
            return Err(LaunchError::Elf {
                path: elf_path,
                source: assembler::AsmError::InvalidElf(format!(
                    "linked at {:#x}, layout places {stage} at {entry:#x}",
                    image.base
                )),
            });
        }
        log::debug!("loaded {} from {}", stage, elf_path.display());
        return Ok(image);
    }

    let bin_path = dir.join(format!("{stem}.bin"));
    if bin_path.is_file() {
        let bytes = fs::read(&bin_path).map_err(|e| LaunchError::io(&bin_path, e))?;
        log::debug!("loaded {} from {}", stage, bin_path.display());
        return Ok(BootImage {
            stage,
            base: entry,
            bytes,
            symbols: Default::default(),
        });
    }

    Err(LaunchError::MissingImage { stage, dir: dir.to_path_buf() })
}
