use std::fmt;

/// Whether job URLs are rooted under a printer or under a printer share.
///
/// Chosen once per job; every call for that job (create, documents, upload
/// session, start, status) is built from the same scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointScope {
    Printer(String),
    Share(String),
}

impl EndpointScope {
    pub fn id(&self) -> &str {
        match self {
            EndpointScope::Printer(id) | EndpointScope::Share(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EndpointScope::Printer(_) => "printer",
            EndpointScope::Share(_) => "share",
        }
    }

    pub fn is_printer(&self) -> bool {
        matches!(self, EndpointScope::Printer(_))
    }

    fn collection(&self) -> &'static str {
        match self {
            EndpointScope::Printer(_) => "printers",
            EndpointScope::Share(_) => "shares",
        }
    }

    /// `{base}/print/{printers|shares}/{id}`
    pub fn root(&self, base: &str) -> String {
        format!("{}/print/{}/{}", base, self.collection(), self.id())
    }

    pub fn jobs_url(&self, base: &str) -> String {
        format!("{}/jobs", self.root(base))
    }

    pub fn job_url(&self, base: &str, job_id: &str) -> String {
        format!("{}/jobs/{}", self.root(base), job_id)
    }

    pub fn documents_url(&self, base: &str, job_id: &str) -> String {
        format!("{}/documents", self.job_url(base, job_id))
    }

    /// Collection-level upload session: document and session in one call.
    pub fn collection_upload_session_url(&self, base: &str, job_id: &str) -> String {
        format!("{}/createUploadSession", self.documents_url(base, job_id))
    }

    pub fn document_upload_session_url(&self, base: &str, job_id: &str, document_id: &str) -> String {
        format!(
            "{}/{}/createUploadSession",
            self.documents_url(base, job_id),
            document_id
        )
    }

    pub fn start_url(&self, base: &str, job_id: &str) -> String {
        format!("{}/start", self.job_url(base, job_id))
    }
}

impl fmt::Display for EndpointScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

pub fn printer_url(base: &str, printer_id: &str) -> String {
    format!(
        "{}/print/printers/{}?$select=id,displayName,manufacturer,model,capabilities,defaults",
        base, printer_id
    )
}

pub fn shares_url(base: &str) -> String {
    format!("{}/print/shares?$expand=printer", base)
}

pub fn share_url(base: &str, share_id: &str) -> String {
    format!("{}/print/shares/{}?$expand=printer", base, share_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://graph.microsoft.com/v1.0";

    #[test]
    fn scope_urls_share_one_root() {
        let printer = EndpointScope::Printer("p1".into());
        let share = EndpointScope::Share("s1".into());

        assert_eq!(
            printer.collection_upload_session_url(BASE, "j1"),
            "https://graph.microsoft.com/v1.0/print/printers/p1/jobs/j1/documents/createUploadSession"
        );
        assert_eq!(
            share.document_upload_session_url(BASE, "j1", "d1"),
            "https://graph.microsoft.com/v1.0/print/shares/s1/jobs/j1/documents/d1/createUploadSession"
        );
        assert_eq!(
            share.start_url(BASE, "j1"),
            "https://graph.microsoft.com/v1.0/print/shares/s1/jobs/j1/start"
        );
    }
}
