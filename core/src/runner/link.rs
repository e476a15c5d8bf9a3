use crate::error::LinkError;

use super::traits::{PendingReader, PendingWriter, Stage};

/// Connected endpoints of a whole chain.
pub(crate) struct Linkage {
    /// Where the external input goes: stage 0's input.
    pub stdin: PendingWriter,
    /// `links[i]` carries stage `i` output into stage `i + 1` input.
    pub links: Vec<(PendingReader, PendingWriter)>,
    /// Where the external output comes from: the last stage's output.
    pub stdout: PendingReader,
    /// One diagnostic source per stage, by position.
    pub diagnostics: Vec<PendingReader>,
}

/// Claims every stage's endpoints and pairs them up in chain order.
pub(crate) fn link(stages: &mut [Box<dyn Stage>]) -> Result<Linkage, LinkError> {
    if stages.is_empty() {
        return Err(LinkError::Empty);
    }

    let mut stdins = Vec::with_capacity(stages.len());
    let mut stdouts = Vec::with_capacity(stages.len());
    let mut diagnostics = Vec::with_capacity(stages.len());

    for (index, stage) in stages.iter_mut().enumerate() {
        let eps = stage.endpoints().map_err(|e| LinkError::Endpoints {
            index,
            name: stage.name().to_string(),
            message: format!("{e:#}"),
        })?;
        stdins.push(eps.stdin);
        stdouts.push(eps.stdout);
        diagnostics.push(eps.stderr);
    }

    let mut stdins = stdins.into_iter();
    let (Some(stdin), Some(stdout)) = (stdins.next(), stdouts.pop()) else {
        return Err(LinkError::Empty);
    };
    // stdouts now holds stages 0..n-1, stdins stages 1..n.
    let links = stdouts.into_iter().zip(stdins).collect();

    tracing::debug!(stages = stages.len(), "pipeline linked");

    Ok(Linkage {
        stdin,
        links,
        stdout,
        diagnostics,
    })
}
