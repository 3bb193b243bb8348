use alloc::{vec, vec::Vec};

use embedded_storage::{ReadStorage, Storage};
use esp_bootloader_esp_idf::partitions::{
    DataPartitionSubType, PARTITION_TABLE_MAX_LEN, PartitionType, read_partition_table,
};
use esp_rom_sys::rom::spiflash::{
    ESP_ROM_SPIFLASH_RESULT_OK, esp_rom_spiflash_erase_sector, esp_rom_spiflash_read,
    esp_rom_spiflash_unlock, esp_rom_spiflash_write,
};
use log::{info, warn};
use scribe_core::{cache::CACHE_BLOB, settings::CONFIG_BLOB, storage::BlobStore};

const FLASH_SECTOR_SIZE: u32 = 4096;
const DEFAULT_FLASH_CAPACITY_BYTES: usize = 16 * 1024 * 1024;

const BLOB_MAGIC: u32 = 0x3142_4353; // "SCB1"
const BLOB_VERSION: u8 = 1;
const HEADER_LEN: u32 = 16;

/// Fixed flash region reserved for one named blob.
#[derive(Clone, Copy, Debug)]
struct BlobSlot {
    name: &'static str,
    sectors: u32,
}

const SLOTS: [BlobSlot; 2] = [
    BlobSlot {
        name: CONFIG_BLOB,
        sectors: 1,
    },
    BlobSlot {
        name: CACHE_BLOB,
        sectors: 2,
    },
];

const fn region_sectors() -> u32 {
    let mut total = 0;
    let mut i = 0;
    while i < SLOTS.len() {
        total += SLOTS[i].sectors;
        i += 1;
    }
    total
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FlashBlobError {
    PartitionTable,
    DataPartitionMissing,
    PartitionTooSmall,
    FlashOpFailed(i32),
    Corrupted,
    Unsupported,
    UnknownBlob,
    TooLarge { len: usize, capacity: usize },
}

#[derive(Debug)]
struct RawFlash;

impl RawFlash {
    fn new() -> Result<Self, FlashBlobError> {
        let rc = unsafe { esp_rom_spiflash_unlock() };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashBlobError::FlashOpFailed(rc));
        }
        Ok(Self)
    }

    fn erase_sector(&mut self, sector_addr: u32) -> Result<(), FlashBlobError> {
        if !sector_addr.is_multiple_of(FLASH_SECTOR_SIZE) {
            return Err(FlashBlobError::Unsupported);
        }

        let rc = unsafe { esp_rom_spiflash_erase_sector(sector_addr / FLASH_SECTOR_SIZE) };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashBlobError::FlashOpFailed(rc));
        }
        Ok(())
    }

    fn read_word(&mut self, addr: u32) -> Result<u32, FlashBlobError> {
        if !addr.is_multiple_of(4) {
            return Err(FlashBlobError::Unsupported);
        }

        let mut word = 0u32;
        let rc = unsafe { esp_rom_spiflash_read(addr, &mut word as *mut u32 as *const u32, 4) };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashBlobError::FlashOpFailed(rc));
        }
        Ok(word)
    }

    fn write_word(&mut self, addr: u32, word: u32) -> Result<(), FlashBlobError> {
        if !addr.is_multiple_of(4) {
            return Err(FlashBlobError::Unsupported);
        }

        let rc = unsafe { esp_rom_spiflash_write(addr, &word as *const u32, 4) };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashBlobError::FlashOpFailed(rc));
        }
        Ok(())
    }

    /// Word-aligned `addr` only; blob records never start mid-word.
    fn read_bytes(&mut self, addr: u32, out: &mut [u8]) -> Result<(), FlashBlobError> {
        if !addr.is_multiple_of(4) {
            return Err(FlashBlobError::Unsupported);
        }

        let mut word_addr = addr;
        for chunk in out.chunks_mut(4) {
            let bytes = self.read_word(word_addr)?.to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
            word_addr += 4;
        }
        Ok(())
    }

    /// Writes into already-erased flash; a trailing partial word is padded
    /// with the erased value.
    fn write_erased_bytes(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashBlobError> {
        if !addr.is_multiple_of(4) {
            return Err(FlashBlobError::Unsupported);
        }

        let mut word_addr = addr;
        for chunk in data.chunks(4) {
            let mut bytes = [0xFFu8; 4];
            bytes[..chunk.len()].copy_from_slice(chunk);
            self.write_word(word_addr, u32::from_le_bytes(bytes))?;
            word_addr += 4;
        }
        Ok(())
    }
}

impl ReadStorage for RawFlash {
    type Error = FlashBlobError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.read_bytes(offset, bytes)
    }

    fn capacity(&self) -> usize {
        DEFAULT_FLASH_CAPACITY_BYTES
    }
}

impl Storage for RawFlash {
    fn write(&mut self, _offset: u32, _bytes: &[u8]) -> Result<(), Self::Error> {
        Err(FlashBlobError::Unsupported)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct BlobHeader {
    len: u32,
    checksum: u32,
}

impl BlobHeader {
    fn encode(self) -> [u8; HEADER_LEN as usize] {
        let mut buf = [0u8; HEADER_LEN as usize];
        buf[0..4].copy_from_slice(&BLOB_MAGIC.to_le_bytes());
        buf[4] = BLOB_VERSION;
        buf[8..12].copy_from_slice(&self.len.to_le_bytes());
        buf[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// `None` for erased flash or a record this firmware did not write.
    fn decode(buf: &[u8; HEADER_LEN as usize]) -> Option<Self> {
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != BLOB_MAGIC || buf[4] != BLOB_VERSION {
            return None;
        }
        Some(Self {
            len: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            checksum: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }
}

/// Named blobs in fixed sector slots at the end of the data partition.
///
/// Each slot holds one record: a 16-byte header (magic, version, length,
/// FNV-1a checksum) followed by the payload. Only the names in the slot
/// table can be stored.
#[derive(Debug)]
pub struct FlashBlobStore {
    flash: RawFlash,
    region_addr: u32,
}

impl FlashBlobStore {
    pub fn new() -> Result<Self, FlashBlobError> {
        let mut flash = RawFlash::new()?;

        let mut table_buf = [0u8; PARTITION_TABLE_MAX_LEN];
        let table = read_partition_table(&mut flash, &mut table_buf)
            .map_err(|_| FlashBlobError::PartitionTable)?;

        let region_len = region_sectors() * FLASH_SECTOR_SIZE;
        let mut best_data_undefined: Option<(u32, u32)> = None;
        let mut fallback_nvs: Option<(u32, u32)> = None;

        for entry in table.iter() {
            if entry.is_read_only() {
                continue;
            }

            match entry.partition_type() {
                PartitionType::Data(DataPartitionSubType::Undefined) => {
                    best_data_undefined = Some((entry.offset(), entry.len()));
                    break;
                }
                PartitionType::Data(DataPartitionSubType::Nvs) => {
                    if fallback_nvs.is_none() {
                        fallback_nvs = Some((entry.offset(), entry.len()));
                    }
                }
                _ => {}
            }
        }

        let (offset, len) = best_data_undefined
            .or(fallback_nvs)
            .ok_or(FlashBlobError::DataPartitionMissing)?;

        if len < region_len {
            return Err(FlashBlobError::PartitionTooSmall);
        }

        let region_addr = offset + len - region_len;
        info!(
            "storage: blob region addr=0x{:x} sectors={}",
            region_addr,
            region_sectors()
        );
        Ok(Self { flash, region_addr })
    }

    fn slot(&self, name: &str) -> Result<(u32, BlobSlot), FlashBlobError> {
        let mut addr = self.region_addr;
        for slot in SLOTS {
            if slot.name == name {
                return Ok((addr, slot));
            }
            addr += slot.sectors * FLASH_SECTOR_SIZE;
        }
        Err(FlashBlobError::UnknownBlob)
    }

    fn header(&mut self, addr: u32) -> Result<Option<BlobHeader>, FlashBlobError> {
        let mut buf = [0u8; HEADER_LEN as usize];
        self.flash.read_bytes(addr, &mut buf)?;
        Ok(BlobHeader::decode(&buf))
    }
}

impl BlobStore for FlashBlobStore {
    type Error = FlashBlobError;

    fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        let (addr, _) = self.slot(name)?;
        Ok(self.header(addr)?.is_some())
    }

    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let (addr, slot) = self.slot(name)?;
        let Some(header) = self.header(addr)? else {
            return Ok(None);
        };

        let capacity = slot.sectors * FLASH_SECTOR_SIZE - HEADER_LEN;
        if header.len > capacity {
            warn!("storage: {} header claims len={}", name, header.len);
            return Err(FlashBlobError::Corrupted);
        }

        let mut data = vec![0u8; header.len as usize];
        self.flash.read_bytes(addr + HEADER_LEN, &mut data)?;
        if checksum32(&data) != header.checksum {
            warn!("storage: {} checksum mismatch", name);
            return Err(FlashBlobError::Corrupted);
        }
        Ok(Some(data))
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        let (addr, slot) = self.slot(name)?;
        let capacity = (slot.sectors * FLASH_SECTOR_SIZE - HEADER_LEN) as usize;
        if data.len() > capacity {
            return Err(FlashBlobError::TooLarge {
                len: data.len(),
                capacity,
            });
        }

        for sector in 0..slot.sectors {
            self.flash.erase_sector(addr + sector * FLASH_SECTOR_SIZE)?;
        }

        // Header goes last so a torn write reads back as absent.
        self.flash.write_erased_bytes(addr + HEADER_LEN, data)?;
        let header = BlobHeader {
            len: data.len() as u32,
            checksum: checksum32(data),
        };
        self.flash.write_erased_bytes(addr, &header.encode())
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        let (addr, _) = self.slot(name)?;
        if self.header(addr)?.is_none() {
            return Ok(());
        }
        self.flash.erase_sector(addr)
    }
}

fn checksum32(bytes: &[u8]) -> u32 {
    let mut hash = 0x811C9DC5u32;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}
