use micro_multipart::{MultipartBody, MultipartError, PostFile};

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    payload: TestPayload,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, payload: TestPayload) -> Self {
        Self { name, group, payload }
    }

    pub fn small(name: &'static str, payload: TestPayload) -> Self {
        Self::new(name, TestGroup::Small, payload)
    }

    pub fn normal(name: &'static str, payload: TestPayload) -> Self {
        Self::new(name, TestGroup::Normal, payload)
    }

    pub fn large(name: &'static str, payload: TestPayload) -> Self {
        Self::new(name, TestGroup::Large, payload)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn payload(&self) -> &TestPayload {
        &self.payload
    }

    /// Builds a fresh body for this case, reading with `chunk_size`.
    pub fn body(&self, chunk_size: usize) -> Result<MultipartBody, MultipartError> {
        self.payload.body(chunk_size)
    }
}

/// Shape of a generated form: how many fields and files, and how large each file is.
#[derive(Debug, Copy, Clone)]
pub struct TestPayload {
    fields: usize,
    files: usize,
    file_size: usize,
}

impl TestPayload {
    pub const fn new(fields: usize, files: usize, file_size: usize) -> Self {
        Self { fields, files, file_size }
    }

    pub fn fields(&self) -> usize {
        self.fields
    }

    pub fn files(&self) -> usize {
        self.files
    }

    pub fn file_size(&self) -> usize {
        self.file_size
    }

    pub fn body(&self, chunk_size: usize) -> Result<MultipartBody, MultipartError> {
        let fields = (0..self.fields).map(|i| (format!("field_{i}"), format!("value of field number {i}")));
        let files = (0..self.files).map(|i| {
            let content: Vec<u8> = (0..self.file_size).map(|n| b'a' + (n % 26) as u8).collect();
            PostFile::new(format!("file_{i}"), format!("upload_{i}.txt"), content)
        });
        MultipartBody::builder()
            .boundary("bencher-boundary")
            .fields(fields)
            .files(files)
            .chunk_size(chunk_size)
            .build()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}
