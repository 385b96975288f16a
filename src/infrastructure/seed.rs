//! Default reference data written on first start.

use crate::application::use_cases::example_library::ExampleLibrary;
use crate::application::use_cases::retrieval_store::{
    COMPLIANCE_DOC, REQUIREMENTS_DOC, TRACEABILITY_DOC,
};
use crate::domain::error::Result;
use crate::domain::requirement::AlmTool;
use crate::infrastructure::storage::{create_if_absent, DataLayout};
use tracing::info;

const COMPLIANCE_TEXT: &str = "Healthcare compliance notes: PHI must be protected. Role-based access, audit trails, encryption at rest and in transit. Data retention guidelines.\n";

const REQUIREMENT_EXAMPLES: &str = r#"[
  {
    "requirement": "Authenticate users",
    "testcases": ["Valid login", "Invalid login"]
  },
  {
    "requirement": "Encrypt PHI",
    "testcases": ["Encrypt in transit", "Encrypt at rest"]
  }
]
"#;

const TRACEABILITY_MATRIX: &str = "ReqID,Requirement,Trace\nR1,Authenticate users,TC001\n";

/// Creates the data directories, one exemplar table per ALM tool and the
/// retrieval corpus. Existing files are never touched. Returns the number of
/// files created.
pub fn ensure_seeded(layout: &DataLayout) -> Result<usize> {
    layout.ensure()?;

    let library = ExampleLibrary::new(layout.examples_dir());
    let mut created = 0;
    for tool in AlmTool::ALL {
        if library.ensure_table(tool)? {
            created += 1;
        }
    }

    let documents = [
        (COMPLIANCE_DOC, COMPLIANCE_TEXT),
        (REQUIREMENTS_DOC, REQUIREMENT_EXAMPLES),
        (TRACEABILITY_DOC, TRACEABILITY_MATRIX),
    ];
    for (name, content) in documents {
        let path = layout.rag_dir().join(name);
        if create_if_absent(&path, content.as_bytes())? {
            info!(path = %path.display(), "Created reference document");
            created += 1;
        }
    }

    Ok(created)
}
