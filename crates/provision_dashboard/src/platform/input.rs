use provision_core::{CatalogContract, JobId};
use serde::Deserialize;

/// One line of dashboard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Register(CatalogContract),
    Remove(JobId),
    Reset(JobId),
    /// Anything that is not a command goes to the tracker as an event frame.
    Frame(String),
    Blank,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum Command {
    Register(CatalogContract),
    Remove(JobId),
    Reset(JobId),
}

pub fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }
    match serde_json::from_str::<Command>(line) {
        Ok(Command::Register(contract)) => Input::Register(contract),
        Ok(Command::Remove(job_id)) => Input::Remove(job_id),
        Ok(Command::Reset(job_id)) => Input::Reset(job_id),
        Err(_) => Input::Frame(line.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use provision_core::StageSpec;

    use super::*;

    #[test]
    fn recognises_commands() {
        assert_eq!(
            parse_line(
                r#"{"register":{"jobId":"job1","stages":[{"id":"gmail","displayName":"Gmail"}]}}"#
            ),
            Input::Register(CatalogContract {
                job_id: "job1".to_string(),
                stages: vec![StageSpec::new("gmail", "Gmail")],
            })
        );
        assert_eq!(
            parse_line(r#" {"remove":"job1"} "#),
            Input::Remove("job1".to_string())
        );
        assert_eq!(parse_line(r#"{"reset":"job1"}"#), Input::Reset("job1".to_string()));
        assert_eq!(parse_line("   "), Input::Blank);
    }

    #[test]
    fn everything_else_is_a_frame() {
        let event = r#"{"jobId":"job1","type":"progress","stage":"gmail","progress":5}"#;
        assert_eq!(parse_line(event), Input::Frame(event.to_string()));
        assert_eq!(parse_line("oops"), Input::Frame("oops".to_string()));
        assert_eq!(
            parse_line(r#"{"remove":42}"#),
            Input::Frame(r#"{"remove":42}"#.to_string())
        );
    }
}
