//! Python bindings for flatok.
//!
//! ```python
//! from flatok import Tokenizer
//!
//! tokenizer = Tokenizer("cl100k_base.tiktoken")
//! tokenizer.encode("hello world")
//! ```
//!
//! `str` inputs are encoded as UTF-8; `encode_bytes` takes arbitrary bytes.  Encoding releases the
//! GIL, so a single `Tokenizer` can be used from many Python threads at once.
use flatok::{FlatokError, TokenInt, TrieConfig};
use pyo3::create_exception;
use pyo3::exceptions::{PyFileNotFoundError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

create_exception!(
    flatok,
    VocabularyError,
    PyValueError,
    "The vocabulary file is malformed or inconsistent"
);
create_exception!(
    flatok,
    OutOfVocabularyError,
    PyValueError,
    "The input contains a byte that no token matches"
);

/// Convert library errors into the matching Python exception
trait IntoPyErr {
    fn into_py_err(self) -> PyErr;
}

impl IntoPyErr for FlatokError {
    fn into_py_err(self) -> PyErr {
        match &self {
            FlatokError::OutOfVocabulary { .. } => OutOfVocabularyError::new_err(self.to_string()),
            FlatokError::FileIo { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                PyFileNotFoundError::new_err(self.to_string())
            }
            _ => VocabularyError::new_err(self.to_string()),
        }
    }
}

/// A tokenizer for one tiktoken vocabulary file
#[pyclass(name = "Tokenizer", module = "flatok", frozen)]
pub struct PyTokenizer {
    inner: flatok::Tokenizer,
}

#[pymethods]
impl PyTokenizer {
    /// Load the vocabulary in `vocab_file`.  With `strict_coverage`, vocabularies that lack a
    /// single-byte token for some byte value are refused.
    #[new]
    #[pyo3(signature = (vocab_file, strict_coverage = false))]
    fn new(py: Python<'_>, vocab_file: PathBuf, strict_coverage: bool) -> PyResult<Self> {
        let config = TrieConfig {
            require_byte_coverage: strict_coverage,
            ..Default::default()
        };

        let inner = py
            .allow_threads(|| flatok::Tokenizer::from_tiktoken_file(&vocab_file, config))
            .map_err(IntoPyErr::into_py_err)?;

        Ok(Self { inner })
    }

    /// Encode text into token ids
    fn encode(&self, py: Python<'_>, text: &str) -> PyResult<Vec<TokenInt>> {
        py.allow_threads(|| self.inner.encode(text))
            .map_err(IntoPyErr::into_py_err)
    }

    /// Encode raw bytes into token ids
    fn encode_bytes(&self, py: Python<'_>, data: &[u8]) -> PyResult<Vec<TokenInt>> {
        py.allow_threads(|| self.inner.encode(data))
            .map_err(IntoPyErr::into_py_err)
    }

    /// Count the tokens in `text` without building the list of ids
    fn count_tokens(&self, py: Python<'_>, text: &str) -> PyResult<usize> {
        py.allow_threads(|| self.inner.count_tokens(text))
            .map_err(IntoPyErr::into_py_err)
    }

    /// Encode many texts on `threads` threads (0 means one per CPU).  Raises on the first text
    /// that can't be encoded.
    #[pyo3(signature = (texts, threads = 0))]
    fn encode_batch(
        &self,
        py: Python<'_>,
        texts: Vec<String>,
        threads: usize,
    ) -> PyResult<Vec<Vec<TokenInt>>> {
        py.allow_threads(|| self.inner.encode_batch(&texts, threads))
            .into_iter()
            .map(|result| result.map_err(IntoPyErr::into_py_err))
            .collect()
    }

    fn __len__(&self) -> usize {
        self.inner.trie().len()
    }

    fn __repr__(&self) -> String {
        format!("Tokenizer(tokens={})", self.inner.trie().len())
    }
}

#[pymodule]
#[pyo3(name = "flatok")]
fn flatok_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTokenizer>()?;
    m.add("VocabularyError", m.py().get_type_bound::<VocabularyError>())?;
    m.add(
        "OutOfVocabularyError",
        m.py().get_type_bound::<OutOfVocabularyError>(),
    )?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vocab_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    /// Run `f` with a tokenizer for the vocabulary "a", "b", "ab"
    fn with_tokenizer(f: impl FnOnce(Python<'_>, PyTokenizer)) {
        let file = vocab_file("YQ== 0\nYg== 1\nYWI= 2\n");

        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let tokenizer = PyTokenizer::new(py, file.path().to_path_buf(), false).unwrap();
            f(py, tokenizer)
        });
    }

    #[test]
    fn encodes() {
        with_tokenizer(|py, tokenizer| {
            assert_eq!(tokenizer.encode(py, "ab").unwrap(), vec![2]);
            assert_eq!(tokenizer.encode(py, "").unwrap(), Vec::<TokenInt>::new());
            assert_eq!(tokenizer.encode_bytes(py, b"bab").unwrap(), vec![1, 2]);
            assert_eq!(tokenizer.count_tokens(py, "abab").unwrap(), 2);
            assert_eq!(
                tokenizer
                    .encode_batch(py, vec!["ab".into(), "ba".into()], 2)
                    .unwrap(),
                vec![vec![2], vec![1, 0]]
            );
            assert_eq!(tokenizer.__len__(), 3);
            assert_eq!(tokenizer.__repr__(), "Tokenizer(tokens=3)");
        });
    }

    #[test]
    fn unencodable_input_raises_out_of_vocabulary() {
        with_tokenizer(|py, tokenizer| {
            let err = tokenizer.encode(py, "abc").unwrap_err();
            assert!(err.is_instance_of::<OutOfVocabularyError>(py));
            assert!(err.is_instance_of::<PyValueError>(py));
            assert_eq!(
                err.value_bound(py).to_string(),
                "No token matches byte 0x63 at input position 2"
            );

            let err = tokenizer
                .encode_batch(py, vec!["ab".into(), "c".into()], 0)
                .unwrap_err();
            assert!(err.is_instance_of::<OutOfVocabularyError>(py));
        });
    }

    #[test]
    fn loading_errors_raise() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let dir = tempfile::tempdir().unwrap();
            let err = PyTokenizer::new(py, dir.path().join("missing.tiktoken"), false)
                .err()
                .unwrap();
            assert!(err.is_instance_of::<PyFileNotFoundError>(py));

            let malformed = vocab_file("YQ== 0\nYg==\n");
            let err = PyTokenizer::new(py, malformed.path().to_path_buf(), false)
                .err()
                .unwrap();
            assert!(err.is_instance_of::<VocabularyError>(py));

            let err = PyTokenizer::new(py, vocab_file("YQ== 0\n").path().to_path_buf(), true)
                .err()
                .unwrap();
            assert!(err.is_instance_of::<VocabularyError>(py));
        });
    }
}
