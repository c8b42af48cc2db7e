//! Current directory, listings, caches and transactions

use ferrox_types::{
    unix_path, Capability, FileList, FileMasks, FsCommand, RemoteFile, Result, SessionUi,
};

use super::Session;
use crate::cache::DirectoryChangesCache;

impl Session {
    /// Enter a transaction level, mirrored to the command session
    pub fn begin_transaction(&mut self) {
        let depth = self.transaction.begin();
        self.log
            .debug(format!("Transaction level {} started", depth));
        if let Some(session) = self.command_session.as_deref_mut() {
            session.begin_transaction();
        }
    }

    /// Leave a transaction level
    ///
    /// Leaving the outermost level of an active session runs the refreshes
    /// requested inside the transaction, once.
    pub fn end_transaction(&mut self) -> Result<()> {
        let depth = self.transaction.depth();
        let outermost = self.transaction.end()?;
        let result = if outermost && self.is_active() {
            let refreshed = self.run_pending_refresh();
            self.transaction.clear_pending();
            refreshed
        } else {
            Ok(())
        };
        self.log
            .debug(format!("Transaction level {} finished", depth));
        let mirrored = match self.command_session.as_deref_mut() {
            Some(session) => session.end_transaction(),
            None => Ok(()),
        };
        result.and(mirrored)
    }

    fn run_pending_refresh(&mut self) -> Result<()> {
        if self.transaction.read_current_directory_pending() {
            self.read_current_directory()?;
        }
        if self.transaction.read_directory_pending() {
            let reload_only = !self.transaction.read_current_directory_pending();
            self.read_directory(reload_only, false)?;
        }
        Ok(())
    }

    /// Current directory as presented to the user, asking the server if unknown
    pub fn current_directory(&mut self) -> Result<String> {
        if self.current_directory.is_empty() && self.is_active() {
            self.read_current_directory()?;
        }
        Ok(self.peek_current_directory())
    }

    /// Change to a directory given as presented to the user
    pub fn set_current_directory(&mut self, directory: &str) -> Result<()> {
        let real = unix_path::translate_locked(directory, &self.lock_directory, false);
        if real == self.current_directory {
            return Ok(());
        }
        self.change_directory(&real)
    }

    /// Ask the server for the current directory
    pub fn read_current_directory(&mut self) -> Result<()> {
        self.transaction.clear_read_current_directory();
        match self.do_read_current_directory() {
            Ok(()) => Ok(()),
            Err(error) => self.command_error(error, "Error getting name of current remote directory."),
        }
    }

    fn do_read_current_directory(&mut self) -> Result<()> {
        let old_directory = self.current_directory.clone();
        let backend = self.backend_mut()?;
        backend.read_current_directory()?;
        let directory = backend.current_directory();
        self.current_directory.clone_from(&directory);

        if let Some(cache) = self.changes_cache.as_mut() {
            if !old_directory.is_empty()
                && !self.last_directory_change.is_empty()
                && old_directory != directory
            {
                cache.add_directory_change(&old_directory, &self.last_directory_change, &directory);
            }
        }
        self.last_directory_change.clear();

        if old_directory.is_empty() {
            self.lock_directory = if self.config.lock_in_home {
                directory.clone()
            } else {
                String::new()
            };
        }
        if old_directory != directory {
            let presented = self.peek_current_directory();
            self.callbacks.directory_changed(&presented)?;
        }
        Ok(())
    }

    /// Change the current directory, reusing a remembered resolution when there is one
    pub fn change_directory(&mut self, directory: &str) -> Result<()> {
        let result = self.do_change_directory(directory).and_then(|()| {
            self.last_directory_change = directory.to_string();
            self.react_on_command(FsCommand::ChangeDirectory)
        });
        match result {
            Ok(()) => Ok(()),
            Err(error) => self.command_error(error, &format!("Error changing directory to '{}'.", directory)),
        }
    }

    fn do_change_directory(&mut self, directory: &str) -> Result<()> {
        let cached = self
            .changes_cache
            .as_ref()
            .and_then(|cache| cache.get_directory_change(&self.current_directory, directory));
        match cached {
            Some(target) => {
                self.log.info(format!(
                    "Cached directory change via \"{}\" to \"{}\".",
                    directory, target
                ));
                self.backend_mut()?.cached_change_directory(&target)
            }
            None => {
                self.log
                    .info(format!("Changing directory to \"{}\".", directory));
                self.backend_mut()?.change_directory(directory)
            }
        }
    }

    /// Change to the login directory
    pub fn home_directory(&mut self) -> Result<()> {
        let result = self
            .backend_mut()
            .and_then(|backend| backend.home_directory())
            .and_then(|()| self.react_on_command(FsCommand::HomeDirectory));
        match result {
            Ok(()) => Ok(()),
            Err(error) => self.command_error(error, "Error changing directory to home directory."),
        }
    }

    /// Refresh the listing snapshot of the current directory
    ///
    /// With directory caching on and a cached listing available, no listing
    /// request is sent: a `reload_only` call keeps a snapshot that is already
    /// current, any other call loads the cached copy. `force_cache` always
    /// loads the cached copy.
    pub fn read_directory(&mut self, reload_only: bool, force_cache: bool) -> Result<()> {
        let directory = self.current_directory.clone();
        if self.config.cache_directories {
            let cached = self.directory_cache.borrow().get(&directory);
            if let Some(list) = cached {
                if reload_only
                    && !force_cache
                    && unix_path::same_path(self.files.directory(), &directory)
                    && list.timestamp() <= self.files.timestamp()
                {
                    self.log
                        .debug(format!("Listing of \"{}\" is current.", directory));
                    return Ok(());
                }
                self.callbacks.read_directory_started()?;
                self.log.debug(format!(
                    "Directory content of \"{}\" loaded from cache.",
                    directory
                ));
                return self.replace_files(list, reload_only, false);
            }
        }

        self.callbacks.read_directory_started()?;
        let mut list = FileList::new(directory.clone());
        match self.custom_read_directory(&mut list) {
            Ok(()) => self.replace_files(list, reload_only, true),
            Err(error) => {
                let replaced = self.replace_files(list, reload_only, false);
                self.command_error(error, &format!("Error listing directory '{}'.", directory))?;
                replaced
            }
        }
    }

    fn replace_files(&mut self, list: FileList, reload_only: bool, cache: bool) -> Result<()> {
        if cache && self.is_active() && self.config.cache_directories {
            self.directory_cache.borrow_mut().add(list.clone());
        }
        self.files = list;
        self.callbacks.directory_read(&self.files, reload_only)
    }

    fn custom_read_directory(&mut self, list: &mut FileList) -> Result<()> {
        let resolve_symlinks = self.config.resolve_symlinks;
        let log = self.log.clone();
        let backend = self.backend_mut()?;
        backend.read_directory(list)?;
        if resolve_symlinks {
            for file in list.files_mut() {
                if !file.is_symlink {
                    continue;
                }
                match backend.read_symlink(file) {
                    Ok(target) => {
                        file.kind = target.kind;
                        if file.link_target.is_none() {
                            file.link_target = Some(target.full_file_name());
                        }
                    }
                    Err(error) => {
                        log.debug(format!("Cannot resolve link \"{}\": {}", file.file_name, error));
                    }
                }
            }
        }
        Ok(())
    }

    /// Load a newer cached listing of the current directory, if any
    pub fn refresh_directory(&mut self) -> Result<()> {
        if self.config.cache_directories
            && self
                .directory_cache
                .borrow()
                .has_newer_file_list(&self.current_directory, self.files.timestamp())
        {
            self.log.debug("Updating directory listing from cache.");
            self.read_directory(true, true)?;
        }
        Ok(())
    }

    /// Drop everything cached about the current directory and read it again
    pub fn reload_directory(&mut self) -> Result<()> {
        let directory = self.current_directory.clone();
        if self.config.cache_directories {
            self.directory_modified(&directory, false);
        }
        if let Some(cache) = self.changes_cache.as_mut() {
            cache.clear_directory_change(&directory);
        }
        self.read_current_directory()?;
        self.read_directory(true, false)?;
        self.transaction.clear_pending();
        Ok(())
    }

    /// Listing of an arbitrary directory, filtered by `masks`
    pub fn read_directory_listing(&mut self, directory: &str, masks: &FileMasks) -> Result<FileList> {
        let listing = self.retrying(&format!("Error listing directory '{}'.", directory), |session| {
            session.do_read_directory_listing(directory, false)
        })?;
        if masks.is_empty() {
            return Ok(listing);
        }
        let mut filtered = FileList::new(listing.directory());
        for file in listing.files() {
            if !file.is_this_directory()
                && !file.is_parent_directory()
                && masks.matches(&file.file_name, file.is_directory())
            {
                filtered.add_file(file.clone());
            }
        }
        Ok(filtered)
    }

    fn custom_read_directory_listing(&mut self, directory: &str, use_cache: bool) -> Result<FileList> {
        self.retrying(&format!("Error listing directory '{}'.", directory), |session| {
            session.do_read_directory_listing(directory, use_cache)
        })
    }

    fn do_read_directory_listing(&mut self, directory: &str, use_cache: bool) -> Result<FileList> {
        let cache = use_cache && self.config.cache_directories;
        if cache {
            if let Some(list) = self.directory_cache.borrow().get(directory) {
                return Ok(list);
            }
        }
        let mut list = FileList::new(directory);
        self.with_exception_on_fail(|session| session.custom_read_directory(&mut list))?;
        if cache {
            self.directory_cache.borrow_mut().add(list.clone());
        }
        Ok(list)
    }

    /// Call `callback` with the full path of every entry of a directory
    ///
    /// With `ignore_errors`, a listing failure on a still active connection
    /// ends the walk of this directory quietly.
    pub fn process_directory<F>(
        &mut self,
        directory: &str,
        mut callback: F,
        use_cache: bool,
        ignore_errors: bool,
    ) -> Result<()>
    where
        F: FnMut(&mut Self, &str, &RemoteFile) -> Result<()>,
    {
        let list = if ignore_errors {
            match self.with_exception_on_fail(|session| {
                session.custom_read_directory_listing(directory, use_cache)
            }) {
                Ok(list) => list,
                Err(error) if self.is_active() => {
                    self.log
                        .debug(format!("Skipping directory \"{}\": {}", directory, error));
                    return Ok(());
                }
                Err(error) => return Err(error),
            }
        } else {
            self.custom_read_directory_listing(directory, use_cache)?
        };

        for file in list.files() {
            if file.is_this_directory() || file.is_parent_directory() {
                continue;
            }
            callback(self, &unix_path::join(directory, &file.file_name), file)?;
        }
        Ok(())
    }

    /// Walk a directory tree, reporting entries that match `masks`
    pub fn files_find<F>(&mut self, directory: &str, masks: &FileMasks, callback: &mut F) -> Result<()>
    where
        F: FnMut(&RemoteFile) -> Result<()>,
    {
        self.process_directory(
            directory,
            |session, path, file| {
                if masks.matches(&file.file_name, file.is_directory()) {
                    callback(file)?;
                }
                if file.is_directory() && !file.is_symlink {
                    session.files_find(path, masks, callback)?;
                }
                Ok(())
            },
            false,
            true,
        )
    }

    /// Forget every cached listing and directory change
    pub fn clear_caches(&mut self) {
        self.directory_cache.borrow_mut().clear();
        if let Some(cache) = self.changes_cache.as_mut() {
            cache.clear();
        }
    }

    /// Whether both caches are empty
    pub fn are_caches_empty(&self) -> bool {
        self.directory_cache.borrow().is_empty()
            && self
                .changes_cache
                .as_ref()
                .map_or(true, DirectoryChangesCache::is_empty)
    }

    /// Refresh after a command, or mark the refresh pending inside a transaction
    pub(crate) fn react_on_command(&mut self, command: FsCommand) -> Result<()> {
        if command.changes_directory() {
            if self.in_transaction() {
                self.transaction.mark_read_current_directory();
                if self.auto_read_directory {
                    self.transaction.mark_read_directory();
                }
            } else {
                self.read_current_directory()?;
                if self.auto_read_directory {
                    self.read_directory(false, false)?;
                }
            }
        } else if command.modifies_files()
            && self.auto_read_directory
            && self.engine.auto_read_directory_after_op
        {
            if self.in_transaction() {
                self.transaction.mark_read_directory();
            } else {
                self.read_directory(true, false)?;
            }
        }
        Ok(())
    }

    /// Invalidate the caches for a file about to change
    ///
    /// Drops the listing of the file's parent, the listings under the file
    /// when it is a directory, and with `clear_directory_change` the
    /// remembered changes into or out of that directory. An entry without a
    /// listing record counts as a possible directory for the latter.
    pub fn file_modified(&mut self, file: Option<&RemoteFile>, file_name: &str, clear_directory_change: bool) {
        let mut parent_directory = String::new();
        let mut directory = String::new();

        if self.config.cache_directories || self.config.cache_directory_changes {
            match file {
                Some(file) if !file.directory.is_empty() => {
                    parent_directory.clone_from(&file.directory);
                }
                _ if !file_name.is_empty() => {
                    parent_directory = unix_path::parent(file_name);
                    if parent_directory.is_empty() {
                        parent_directory.clone_from(&self.current_directory);
                    }
                }
                _ => {}
            }
            if file.is_some_and(RemoteFile::is_directory) && !parent_directory.is_empty() {
                directory = unix_path::join(&parent_directory, unix_path::file_name(file_name));
            }
        }

        if self.config.cache_directories {
            if !directory.is_empty() {
                self.directory_modified(&directory, true);
            }
            if !parent_directory.is_empty() {
                self.directory_modified(&parent_directory, false);
            }
        }
        if clear_directory_change {
            // an entry of unknown kind may still be a directory
            if directory.is_empty() && file.is_none() && !parent_directory.is_empty() {
                directory = unix_path::join(&parent_directory, unix_path::file_name(file_name));
            }
            if !directory.is_empty() {
                self.forget_directory_changes(&directory);
            }
        }
    }

    /// Forget remembered changes made from, or leading into, `directory`
    pub(crate) fn forget_directory_changes(&mut self, directory: &str) {
        if let Some(cache) = self.changes_cache.as_mut() {
            let directory = unix_path::exclude_trailing_slash(directory);
            cache.clear_directory_change(&directory);
            cache.clear_directory_change_target(&directory);
        }
    }

    /// Drop the cached listing of a directory, and of its subdirectories with `sub_dirs`
    pub fn directory_modified(&mut self, path: &str, sub_dirs: bool) {
        let path = if path.is_empty() {
            self.current_directory.clone()
        } else {
            unix_path::exclude_trailing_slash(path)
        };
        self.log
            .debug(format!("Directory \"{}\" modified", path));
        self.directory_cache
            .borrow_mut()
            .clear_file_list(&path, sub_dirs);
    }

    /// Load user and group names once per connection
    pub fn lookup_users_groups(&mut self) -> Result<()> {
        if self.users_groups_looked_up
            || !self.config.lookup_user_groups
            || !self.is_capable(Capability::UserGroupListing)
        {
            return Ok(());
        }
        self.users_groups_looked_up = true;
        self.log.info("Looking up groups and users");
        match self.backend_mut()?.lookup_users_groups() {
            Ok(()) => Ok(()),
            Err(error) => self.command_error(error, "Error looking up user groups."),
        }
    }

    /// Attributes of a single remote file
    pub fn read_file(&mut self, path: &str) -> Result<RemoteFile> {
        self.log.debug(format!("Listing file \"{}\".", path));
        let resolve_symlinks = self.config.resolve_symlinks;
        let result = self.backend_mut().and_then(|backend| {
            let mut file = backend.read_file(path)?;
            if file.is_symlink && resolve_symlinks {
                if let Ok(target) = backend.read_symlink(&file) {
                    file.kind = target.kind;
                }
            }
            Ok(file)
        });
        result.map_err(|error| self.raise(error, &format!("Can't get attributes of file '{}'.", path)))
    }

    /// Whether a remote path exists
    pub fn file_exists(&mut self, path: &str) -> Result<bool> {
        match self.with_exception_on_fail(|session| session.read_file(path)) {
            Ok(_) => Ok(true),
            Err(_) if self.is_active() => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Target of a symbolic link
    pub fn read_symlink(&mut self, link: &RemoteFile) -> Result<RemoteFile> {
        self.log
            .debug(format!("Reading symlink \"{}\".", link.full_file_name()));
        let result = self
            .backend_mut()
            .and_then(|backend| backend.read_symlink(link));
        result.map_err(|error| {
            self.raise(error, &format!("Error reading symlink '{}'.", link.full_file_name()))
        })
    }
}
