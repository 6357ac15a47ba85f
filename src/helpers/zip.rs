//! Entry lookup inside the ZIP container of an XLSX package

use crate::error::RustyFillError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Access to package parts by name.
///
/// Part names compare case-insensitively and `\` counts as `/`, since some
/// producers write entry names that differ from the relationship targets.
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// The entry named `name`, or None if the package has no such part
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustyFillError>;

    /// Pull parser over an XML part
    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustyFillError>;

    /// Decompressed content of a part
    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, RustyFillError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustyFillError> {
        let wanted = name.replace('\\', "/");
        let Some(index) = self
            .file_names()
            .position(|entry| entry.replace('\\', "/").eq_ignore_ascii_case(&wanted))
        else {
            return Ok(None);
        };
        let entry = self.file_names().nth(index).map(str::to_owned);
        match entry.map(|entry| self.by_name(&entry)) {
            Some(Ok(file)) => Ok(Some(file)),
            None | Some(Err(ZipError::FileNotFound)) => Ok(None),
            Some(Err(error)) => Err(error.into()),
        }
    }

    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustyFillError> {
        Ok(self.file(name)?.map(|file| XmlReader::new(BufReader::new(file))))
    }

    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, RustyFillError> {
        let Some(mut file) = self.file(name)? else {
            return Ok(None);
        };
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }
}
