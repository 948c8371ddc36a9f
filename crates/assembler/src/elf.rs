//! ELF64 container for boot images.
//!
//! Images are written as minimal static RISC-V executables: one `PT_LOAD`
//! segment covering `.text`, plus `.symtab`/`.strtab` carrying the stage
//! labels so debuggers and the disassembler can show them. Reading goes
//! through goblin.

use std::collections::BTreeMap;

use goblin::elf::header::{EI_CLASS, EI_DATA, EI_VERSION, ELFCLASS64, ELFDATA2LSB, ELFMAG, EM_RISCV, ET_EXEC, EV_CURRENT};
use goblin::elf::program_header::{PF_R, PF_X, PT_LOAD};
use goblin::elf::section_header::{SHF_ALLOC, SHF_EXECINSTR, SHT_NOBITS, SHT_PROGBITS, SHT_STRTAB, SHT_SYMTAB};
use goblin::elf::sym::{STB_GLOBAL, STT_FUNC, STT_NOTYPE};
use goblin::elf::Elf;
use goblin::elf64::header::{Header, SIZEOF_EHDR};
use goblin::elf64::program_header::{ProgramHeader, SIZEOF_PHDR};
use goblin::elf64::section_header::{SectionHeader, SIZEOF_SHDR};
use goblin::elf64::sym::{Sym, SIZEOF_SYM};
use scroll::{Pwrite, LE};
use types::Stage;

use crate::{AsmError, BootImage};

/// `.text` file offset; matches the segment alignment.
const TEXT_OFFSET: usize = 0x1000;
const TEXT_SECTION: u16 = 1;

pub struct ElfInfo<'a> {
    pub entry: u64,
    pub sections: Vec<ElfSection<'a>>,
    pub symbols: BTreeMap<String, u64>,
}

pub struct ElfSection<'a> {
    pub name: String,
    pub addr: u64,
    pub size: u64,
    pub data: &'a [u8],
}

impl<'a> ElfInfo<'a> {
    /// Merges all `.text*` sections into one flat buffer and returns it with
    /// its base address. Fails if the merged span exceeds `max_len` bytes.
    pub fn get_flat_code(&self, max_len: u64) -> Result<(Vec<u8>, u64), AsmError> {
        let text_sections: Vec<&ElfSection> = self
            .sections
            .iter()
            .filter(|s| s.name.starts_with(".text"))
            .collect();

        let min_addr = text_sections
            .iter()
            .map(|s| s.addr)
            .min()
            .ok_or_else(|| AsmError::InvalidElf("no .text section".into()))?;
        let mut max_addr = min_addr;
        for section in &text_sections {
            let end = section
                .addr
                .checked_add(section.size)
                .ok_or_else(|| AsmError::InvalidElf(format!("{} wraps the address space", section.name)))?;
            max_addr = max_addr.max(end);
        }

        let span = max_addr - min_addr;
        if span > max_len {
            return Err(AsmError::InvalidElf(format!(
                ".text spans {span:#x} bytes, more than the {max_len:#x} available"
            )));
        }

        let mut flat_code = vec![0u8; span as usize];
        for section in text_sections {
            let offset = (section.addr - min_addr) as usize;
            let end = offset + section.data.len();
            let Some(dst) = flat_code.get_mut(offset..end) else {
                return Err(AsmError::InvalidElf(format!("{} data exceeds its size", section.name)));
            };
            dst.copy_from_slice(section.data);
        }
        Ok((flat_code, min_addr))
    }
}
pub fn parse_elf_from_bytes(bytes: &[u8]) -> Result<ElfInfo<'_>, AsmError> {
    let elf = Elf::parse(bytes)?;
    if elf.header.e_machine != EM_RISCV || !elf.is_64 {
        return Err(AsmError::InvalidElf("not an RV64 executable".into()));
    }

    let mut sections = Vec::new();
    for section in elf.section_headers.iter() {
        let Some(name) = elf.shdr_strtab.get_at(section.sh_name) else {
            continue;
        };
        let data = if section.sh_type == SHT_NOBITS {
            &bytes[0..0]
        } else {
            file_range(bytes, section.sh_offset, section.sh_size)
                .ok_or_else(|| AsmError::InvalidElf(format!("{name} lies outside the file")))?
        };
        sections.push(ElfSection {
            name: name.to_string(),
            addr: section.sh_addr,
            size: section.sh_size,
            data,
        });
    }

    let symbols = elf
        .syms
        .iter()
        .filter_map(|sym| {
            let name = elf.strtab.get_at(sym.st_name)?;
            (!name.is_empty()).then(|| (name.to_string(), sym.st_value))
        })
        .collect();

    Ok(ElfInfo { entry: elf.entry, sections, symbols })
}

fn file_range(bytes: &[u8], offset: u64, size: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(size).ok()?)?;
    bytes.get(start..end)
}

impl BootImage {
    /// Reads an image produced by [`write_elf`] back. `capacity` bounds the
    /// code size, normally the size of the stage's region.
    pub fn from_elf(bytes: &[u8], stage: Stage, capacity: u64) -> Result<BootImage, AsmError> {
        let info = parse_elf_from_bytes(bytes)?;
        let (code, base) = info.get_flat_code(capacity)?;
        if info.entry != base {
            return Err(AsmError::InvalidElf(format!(
                "entry {:#x} is not the start of .text ({base:#x})",
                info.entry
            )));
        }
        Ok(BootImage { stage, base, bytes: code, symbols: info.symbols })
    }
}

fn section_header(name: u32, sh_type: u32, offset: usize, size: usize) -> SectionHeader {
    SectionHeader {
        sh_name: name,
        sh_type,
        sh_offset: offset as u64,
        sh_size: size as u64,
        sh_addralign: 1,
        ..Default::default()
    }
}

/// Serializes `image` as a static ELF64 RISC-V executable.
pub fn write_elf(image: &BootImage) -> Result<Vec<u8>, AsmError> {
    let text_len = image.bytes.len();

    let mut strtab = vec![0u8];
    let mut syms = vec![Sym::default()];
    for (name, addr) in image.symbols_by_address() {
        let kind = if name == "_start" || addr == image.base { STT_FUNC } else { STT_NOTYPE };
        syms.push(Sym {
            st_name: strtab.len() as u32,
            st_info: (STB_GLOBAL << 4) | kind,
            st_other: 0,
            st_shndx: TEXT_SECTION,
            st_value: addr,
            st_size: 0,
        });
        strtab.extend_from_slice(name.as_bytes());
        strtab.push(0);
    }

    let shstrtab = b"\0.text\0.symtab\0.strtab\0.shstrtab\0";
    let (sh_text, sh_symtab, sh_strtab, sh_shstrtab) = (1u32, 7u32, 15u32, 23u32);

    let symtab_off = (TEXT_OFFSET + text_len).next_multiple_of(8);
    let symtab_len = syms.len() * SIZEOF_SYM;
    let strtab_off = symtab_off + symtab_len;
    let shstrtab_off = strtab_off + strtab.len();
    let shoff = (shstrtab_off + shstrtab.len()).next_multiple_of(8);

    let sections = [
        SectionHeader::default(),
        SectionHeader {
            sh_addr: image.base,
            sh_flags: u64::from(SHF_ALLOC | SHF_EXECINSTR),
            sh_addralign: 4,
            ..section_header(sh_text, SHT_PROGBITS, TEXT_OFFSET, text_len)
        },
        SectionHeader {
            sh_link: 3,
            sh_info: 1,
            sh_addralign: 8,
            sh_entsize: SIZEOF_SYM as u64,
            ..section_header(sh_symtab, SHT_SYMTAB, symtab_off, symtab_len)
        },
        section_header(sh_strtab, SHT_STRTAB, strtab_off, strtab.len()),
        section_header(sh_shstrtab, SHT_STRTAB, shstrtab_off, shstrtab.len()),
    ];

    let mut e_ident = [0u8; 16];
    e_ident[..4].copy_from_slice(ELFMAG);
    e_ident[EI_CLASS] = ELFCLASS64;
    e_ident[EI_DATA] = ELFDATA2LSB;
    e_ident[EI_VERSION] = EV_CURRENT;
    let header = Header {
        e_ident,
        e_type: ET_EXEC,
        e_machine: EM_RISCV,
        e_version: u32::from(EV_CURRENT),
        e_entry: image.base,
        e_phoff: SIZEOF_EHDR as u64,
        e_shoff: shoff as u64,
        e_flags: 0,
        e_ehsize: SIZEOF_EHDR as u16,
        e_phentsize: SIZEOF_PHDR as u16,
        e_phnum: 1,
        e_shentsize: SIZEOF_SHDR as u16,
        e_shnum: sections.len() as u16,
        e_shstrndx: 4,
    };
    let segment = ProgramHeader {
        p_type: PT_LOAD,
        p_flags: PF_R | PF_X,
        p_offset: TEXT_OFFSET as u64,
        p_vaddr: image.base,
        p_paddr: image.base,
        p_filesz: text_len as u64,
        p_memsz: text_len as u64,
        p_align: TEXT_OFFSET as u64,
    };

    let mut out = vec![0u8; shoff + sections.len() * SIZEOF_SHDR];
    out.pwrite_with(header, 0, LE)?;
    out.pwrite_with(segment, SIZEOF_EHDR, LE)?;
    out[TEXT_OFFSET..TEXT_OFFSET + text_len].copy_from_slice(&image.bytes);
    let mut offset = symtab_off;
    for sym in syms {
        offset += out.pwrite_with(sym, offset, LE)?;
    }
    out[strtab_off..shstrtab_off].copy_from_slice(&strtab);
    out[shstrtab_off..shstrtab_off + shstrtab.len()].copy_from_slice(shstrtab);
    let mut offset = shoff;
    for section in sections {
        offset += out.pwrite_with(section, offset, LE)?;
    }
    Ok(out)
}
