use axum::extract::{multipart::MultipartError, Multipart};
use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("malformed form data: {0}")]
    Multipart(#[from] MultipartError),
    #[error("missing form field `{0}`")]
    MissingField(&'static str),
}

pub struct Upload {
    pub filename: String,
    pub data: Bytes,
}

/// A fully buffered multipart form. Browsers submit empty file inputs as
/// parts with no content; those are dropped.
#[derive(Default)]
pub struct FormData {
    files: HashMap<String, Vec<Upload>>,
    text: HashMap<String, Vec<String>>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, FormError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let data = field.bytes().await?;
                    if data.is_empty() && filename.is_empty() {
                        continue;
                    }
                    form.files.entry(name).or_default().push(Upload { filename, data });
                }
                None => {
                    let value = field.text().await?;
                    form.text.entry(name).or_default().push(value);
                }
            }
        }

        Ok(form)
    }

    pub fn take_file(&mut self, name: &'static str) -> Result<Upload, FormError> {
        self.files
            .get_mut(name)
            .filter(|files| !files.is_empty())
            .map(|files| files.remove(0))
            .ok_or(FormError::MissingField(name))
    }

    pub fn take_files(&mut self, name: &str) -> Vec<Upload> {
        self.files.remove(name).unwrap_or_default()
    }

    /// First value of a text field, empty when absent.
    pub fn text(&self, name: &str) -> &str {
        self.text
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// All values of a repeated field such as a group of checkboxes.
    pub fn texts(&self, name: &str) -> Vec<String> {
        self.text.get(name).cloned().unwrap_or_default()
    }
}
