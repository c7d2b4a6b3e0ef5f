/// Every action the user can trigger, named independently of any widget.
/// The panels only emit these; `PaperBrowserApp::dispatch` maps each one to
/// its handler in a single match, so the wiring is visible in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search,
    FirstPage,
    PreviousPage,
    NextPage,
    LastPage,
    GotoPage(usize),
    SetPageSize(usize),
    /// 0-based row index within the current page.
    SelectRow(usize),
    ExportResults,
    PickDatabase,
    PickImageDirectory,
    OpenImage,
    RequestExit,
    ConfirmExit,
    CancelExit,
}
