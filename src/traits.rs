/// Access to the branches of a collection of trees
pub trait TreeSource {
    type Error;

    /// Identifiers of all trees, in storage order
    fn tree_names(&mut self) -> Result<Vec<String>, Self::Error>;

    /// Branch names of a tree in their native order
    ///
    /// Returns `None` if there is no tree with the given identifier.
    fn branch_names(
        &mut self,
        tree: &str,
    ) -> Result<Option<Vec<String>>, Self::Error>;

    /// All values of a branch, cast to `f64`
    fn read_branch(
        &mut self,
        tree: &str,
        branch: &str,
    ) -> Result<Vec<f64>, Self::Error>;
}

/// Progress indicator, e.g. a progress bar
pub trait Progress {
    /// Advance the progress by `i`
    fn inc(&self, i: u64);
    /// Finish progress
    fn finish(&self);
}
