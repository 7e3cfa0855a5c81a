/// Subpass - one rendering phase of a render pass
///
/// Subpasses run in declaration order. Subpass `i` depends on `i - 1`, the
/// first on work before the pass and the pass's successors on the last.

/// Subpass declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subpass {
    index: u32,
    /// Bindings written by this subpass (color, plus at most one depth)
    attachment_bindings: Vec<u32>,
    /// Bindings read as input attachments
    input_bindings: Vec<u32>,
}

impl Subpass {
    pub fn new(index: u32, attachment_bindings: &[u32]) -> Self {
        Self {
            index,
            attachment_bindings: attachment_bindings.to_vec(),
            input_bindings: Vec::new(),
        }
    }

    /// Read `bindings` as input attachments (written by an earlier subpass)
    pub fn with_inputs(mut self, bindings: &[u32]) -> Self {
        self.input_bindings = bindings.to_vec();
        self
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn attachment_bindings(&self) -> &[u32] {
        &self.attachment_bindings
    }

    pub fn input_bindings(&self) -> &[u32] {
        &self.input_bindings
    }
}
