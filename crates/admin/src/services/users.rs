//! Back-office user accounts and password authentication.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::sync::RwLock;
use tracing::instrument;

use agencia_check_core::{Email, Permission, UserId, UserRole, permission_keys};

use crate::clock::SharedClock;
use crate::config::{AdminCredential, BootstrapAdmin};
use crate::models::{CurrentUser, NewUser, User, UserUpdate, UserView};

use super::error::{ServiceError, ServiceResult, require, require_admin};

const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with Argon2id and a random salt.
///
/// # Errors
///
/// Returns `ServiceError::Internal` if hashing fails.
pub fn hash_password(password: &str) -> ServiceResult<String> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Check a password against a PHC hash string. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn validate_password(password: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "a senha deve ter pelo menos {MIN_PASSWORD_LEN} caracteres"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("o nome é obrigatório".into()));
    }
    Ok(name.to_string())
}

#[derive(Debug, Default)]
struct Users {
    items: Vec<User>,
    next_id: i32,
}

impl Users {
    fn allocate_id(&mut self) -> UserId {
        self.next_id += 1;
        UserId::new(self.next_id)
    }

    fn email_taken(&self, email: &Email, except: Option<UserId>) -> bool {
        self.items
            .iter()
            .any(|u| &u.email == email && Some(u.id) != except)
    }

    fn position(&self, id: UserId) -> ServiceResult<usize> {
        self.items
            .iter()
            .position(|u| u.id == id)
            .ok_or(ServiceError::NotFound("Usuário"))
    }
}

/// In-memory user directory. Cheap to clone.
#[derive(Clone)]
pub struct UserService {
    users: Arc<RwLock<Users>>,
    clock: SharedClock,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}

impl UserService {
    /// Create an empty directory.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            users: Arc::new(RwLock::new(Users::default())),
            clock,
        }
    }

    /// Create a directory holding the bootstrap admin and, optionally, one
    /// demo user per remaining role sharing the admin's password.
    ///
    /// # Errors
    ///
    /// Returns an error if the admin password cannot be hashed.
    pub async fn seeded(
        clock: SharedClock,
        admin: &BootstrapAdmin,
        demo_users: bool,
    ) -> ServiceResult<Self> {
        let service = Self::new(clock);
        let hash = match &admin.credential {
            AdminCredential::Password(password) => hash_password(password.expose_secret())?,
            AdminCredential::Hash(hash) => hash.clone(),
        };

        service
            .insert_seed(admin.email.clone(), "Administrador", UserRole::Admin, hash.clone())
            .await;

        if demo_users {
            let domain = admin.email.domain();
            for (local, name, role) in [
                ("gerente", "Gerente", UserRole::Manager),
                ("vendas", "Vendas", UserRole::Sales),
                ("visualizador", "Visualizador", UserRole::Viewer),
            ] {
                let email = Email::parse(&format!("{local}@{domain}"))?;
                service.insert_seed(email, name, role, hash.clone()).await;
            }
        }

        tracing::info!(
            admin = %admin.email,
            demo_users,
            count = service.count().await,
            "Seeded users"
        );
        Ok(service)
    }

    async fn insert_seed(&self, email: Email, name: &str, role: UserRole, password_hash: String) {
        let now = self.clock.now();
        let mut users = self.users.write().await;
        if users.email_taken(&email, None) {
            return;
        }
        let id = users.allocate_id();
        users.items.push(User {
            id,
            email,
            name: name.to_string(),
            role,
            is_active: true,
            permissions: permission_keys(role),
            password_hash,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        });
    }

    /// Number of users.
    pub async fn count(&self) -> usize {
        self.users.read().await.items.len()
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Check credentials and return the session identity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown email, a wrong password or
    /// an inactive account alike.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<CurrentUser> {
        let Ok(email) = Email::parse(email) else {
            return Err(ServiceError::InvalidCredentials);
        };

        let mut users = self.users.write().await;
        let Some(user) = users.items.iter_mut().find(|u| u.email == email) else {
            tracing::info!(%email, "Login failed: unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        if !user.is_active || !verify_password(password, &user.password_hash) {
            tracing::info!(user_id = %user.id, active = user.is_active, "Login failed");
            return Err(ServiceError::InvalidCredentials);
        }

        user.last_login_at = Some(self.clock.now());
        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
        Ok(CurrentUser::from(&*user))
    }

    /// Re-read the identity of a session user. Returns `None` once the user
    /// has been deleted or deactivated.
    pub async fn refresh(&self, current: &CurrentUser) -> Option<CurrentUser> {
        self.users
            .read()
            .await
            .items
            .iter()
            .find(|u| u.id == current.id && u.is_active)
            .map(CurrentUser::from)
    }

    // =========================================================================
    // Management
    // =========================================================================

    /// List every user.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageUsers`.
    pub async fn list(&self, actor: &CurrentUser) -> ServiceResult<Vec<UserView>> {
        require(actor, Permission::ManageUsers)?;
        Ok(self.users.read().await.items.iter().map(UserView::from).collect())
    }

    /// Fetch one user.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageUsers`, `NotFound` for an unknown id.
    pub async fn get(&self, actor: &CurrentUser, id: UserId) -> ServiceResult<UserView> {
        require(actor, Permission::ManageUsers)?;
        let users = self.users.read().await;
        let index = users.position(id)?;
        users
            .items
            .get(index)
            .map(UserView::from)
            .ok_or(ServiceError::NotFound("Usuário"))
    }

    /// Create a user. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `AdminOnly`, a validation error, or `Conflict` when the email
    /// is already registered.
    #[instrument(skip(self, actor, input), fields(actor = %actor.id, role = %input.role))]
    pub async fn create(&self, actor: &CurrentUser, input: NewUser) -> ServiceResult<UserView> {
        require_admin(actor)?;
        let email = Email::parse(&input.email)?;
        let name = validate_name(&input.name)?;
        validate_password(&input.password)?;
        let password_hash = hash_password(&input.password)?;

        let now = self.clock.now();
        let mut users = self.users.write().await;
        if users.email_taken(&email, None) {
            return Err(ServiceError::Conflict(format!(
                "Já existe um usuário com o email {email}"
            )));
        }

        let user = User {
            id: users.allocate_id(),
            email,
            name,
            role: input.role,
            is_active: true,
            permissions: permission_keys(input.role),
            password_hash,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        let view = UserView::from(&user);
        users.items.push(user);

        tracing::info!(user_id = %view.id, email = %view.email, "User created");
        Ok(view)
    }

    /// Update a user. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `AdminOnly`, `NotFound`, a validation error, or `Conflict` when
    /// the new email belongs to someone else.
    #[instrument(skip(self, actor, update), fields(actor = %actor.id))]
    pub async fn update(
        &self,
        actor: &CurrentUser,
        id: UserId,
        update: UserUpdate,
    ) -> ServiceResult<UserView> {
        require_admin(actor)?;
        let email = update.email.as_deref().map(Email::parse).transpose()?;
        let name = update.name.as_deref().map(validate_name).transpose()?;
        let password_hash = match update.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let now = self.clock.now();
        let mut users = self.users.write().await;
        let index = users.position(id)?;
        if let Some(email) = &email
            && users.email_taken(email, Some(id))
        {
            return Err(ServiceError::Conflict(format!(
                "Já existe um usuário com o email {email}"
            )));
        }

        let user = users
            .items
            .get_mut(index)
            .ok_or(ServiceError::NotFound("Usuário"))?;
        if let Some(email) = email {
            user.email = email;
        }
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(role) = update.role {
            user.set_role(role);
        }
        if let Some(is_active) = update.is_active {
            user.is_active = is_active;
        }
        if let Some(hash) = password_hash {
            user.password_hash = hash;
        }
        user.updated_at = now;

        tracing::info!(user_id = %id, "User updated");
        Ok(UserView::from(&*user))
    }

    /// Delete a user. Admin only; admins cannot delete themselves.
    ///
    /// # Errors
    ///
    /// Returns `AdminOnly`, `Conflict` for self-deletion, or `NotFound`.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete(&self, actor: &CurrentUser, id: UserId) -> ServiceResult<()> {
        require_admin(actor)?;
        if actor.id == id {
            return Err(ServiceError::Conflict(
                "Você não pode excluir sua própria conta".into(),
            ));
        }

        let mut users = self.users.write().await;
        let index = users.position(id)?;
        users.items.remove(index);

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Every user as exported in backups (no password hashes).
    pub async fn export(&self) -> Vec<UserView> {
        self.users.read().await.items.iter().map(UserView::from).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use secrecy::SecretString;

    const PASSWORD: &str = "Vx9!kq2#Lm";

    async fn service() -> (UserService, CurrentUser) {
        let admin = BootstrapAdmin {
            email: Email::parse("admin@agencia.com.br").unwrap(),
            credential: AdminCredential::Password(SecretString::from(PASSWORD)),
        };
        let users = UserService::seeded(FixedClock::shared(chrono::Utc::now()), &admin, true)
            .await
            .unwrap();
        let current = users.authenticate("admin@agencia.com.br", PASSWORD).await.unwrap();
        (users, current)
    }

    fn new_user(email: &str, role: UserRole) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Maria".to_string(),
            role,
            password: "segredo-forte-1".to_string(),
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_seeding_with_demo_users() {
        let (users, admin) = service().await;
        assert_eq!(users.count().await, 4);
        assert_eq!(admin.role, UserRole::Admin);

        let manager = users.authenticate("gerente@agencia.com.br", PASSWORD).await.unwrap();
        assert_eq!(manager.role, UserRole::Manager);
    }

    #[tokio::test]
    async fn test_authentication_failures_look_identical() {
        let (users, admin) = service().await;

        let unknown = users.authenticate("ninguem@agencia.com.br", PASSWORD).await;
        let wrong = users.authenticate("admin@agencia.com.br", "errada").await;
        assert!(matches!(unknown, Err(ServiceError::InvalidCredentials)));
        assert!(matches!(wrong, Err(ServiceError::InvalidCredentials)));

        let created = users
            .create(&admin, new_user("inativo@agencia.com.br", UserRole::Viewer))
            .await
            .unwrap();
        users
            .update(
                &admin,
                created.id,
                UserUpdate {
                    is_active: Some(false),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        let inactive = users.authenticate("inativo@agencia.com.br", "segredo-forte-1").await;
        assert!(matches!(inactive, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_is_case_insensitive_and_records_time() {
        let (users, admin) = service().await;
        let again = users.authenticate("  ADMIN@Agencia.com.br ", PASSWORD).await.unwrap();
        assert_eq!(again.id, admin.id);

        let view = users.get(&admin, admin.id).await.unwrap();
        assert!(view.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (users, admin) = service().await;
        users
            .create(&admin, new_user("maria@agencia.com.br", UserRole::Sales))
            .await
            .unwrap();

        let result = users
            .create(&admin, new_user("MARIA@agencia.com.br", UserRole::Viewer))
            .await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert_eq!(users.count().await, 5);
    }

    #[tokio::test]
    async fn test_forbidden_leaves_collection_unchanged() {
        let (users, _) = service().await;
        let manager = users.authenticate("gerente@agencia.com.br", PASSWORD).await.unwrap();
        let before = users.export().await;

        let created = users
            .create(&manager, new_user("novo@agencia.com.br", UserRole::Viewer))
            .await;
        assert!(matches!(created, Err(ServiceError::AdminOnly)));

        let listed = users.list(&manager).await;
        assert!(matches!(
            listed,
            Err(ServiceError::Forbidden(Permission::ManageUsers))
        ));

        let deleted = users.delete(&manager, UserId::new(1)).await;
        assert!(matches!(deleted, Err(ServiceError::AdminOnly)));

        assert_eq!(users.export().await, before);
    }

    #[tokio::test]
    async fn test_role_change_recomputes_permissions() {
        let (users, admin) = service().await;
        let created = users
            .create(&admin, new_user("ana@agencia.com.br", UserRole::Viewer))
            .await
            .unwrap();
        assert!(!created.permissions.contains(&"sales:manage".to_string()));

        let updated = users
            .update(
                &admin,
                created.id,
                UserUpdate {
                    role: Some(UserRole::Sales),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.permissions, permission_keys(UserRole::Sales));
    }

    #[tokio::test]
    async fn test_update_email_to_existing_conflicts() {
        let (users, admin) = service().await;
        let created = users
            .create(&admin, new_user("joao@agencia.com.br", UserRole::Viewer))
            .await
            .unwrap();
        let result = users
            .update(
                &admin,
                created.id,
                UserUpdate {
                    email: Some("vendas@agencia.com.br".into()),
                    ..UserUpdate::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_self() {
        let (users, admin) = service().await;
        let result = users.delete(&admin, admin.id).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));

        let viewer = users.authenticate("visualizador@agencia.com.br", PASSWORD).await.unwrap();
        users.delete(&admin, viewer.id).await.unwrap();
        assert!(users.refresh(&viewer).await.is_none());
        assert!(matches!(
            users.delete(&admin, viewer.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let (users, admin) = service().await;
        let mut input = new_user("curta@agencia.com.br", UserRole::Viewer);
        input.password = "123".into();
        let result = users.create(&admin, input).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
