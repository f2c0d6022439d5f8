use super::{EmailMessage, MessageKind};

const SIGN_OFF: &str = "Best regards,\nDriveHub Team";

pub fn welcome(to: &str, student_name: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Welcome to DriveHub!".to_string(),
        body: format!(
            "Welcome to DriveHub, {student_name}!\n\n\
             Thank you for registering with DriveHub Driving School. Your account has been created.\n\n\
             Next steps:\n\
             1. Log in to your student dashboard\n\
             2. Choose a learning package that suits your needs\n\
             3. Complete the payment process\n\
             4. Start your driving lessons!\n\n\
             Happy driving!\nDriveHub Team"
        ),
        kind: MessageKind::Welcome,
    }
}

pub fn welcome_sms(student_name: &str) -> String {
    format!(
        "Welcome to DriveHub {student_name}! Your account was created successfully. Check email for details."
    )
}

pub fn password_reset(to: &str, reset_link: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "DriveHub - Password Reset Request".to_string(),
        body: format!(
            "You requested to reset your password for your DriveHub account.\n\n\
             Reset your password here:\n{reset_link}\n\n\
             If you didn't request this, please ignore this email.\n\n{SIGN_OFF}"
        ),
        kind: MessageKind::PasswordReset,
    }
}

pub fn receipt(
    to: &str,
    student_name: &str,
    package_name: &str,
    amount: u32,
    receipt_number: &str,
) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "DriveHub - Payment Receipt".to_string(),
        body: format!(
            "Dear {student_name},\n\n\
             Thank you for your payment! Your transaction has been processed successfully.\n\n\
             Package: {package_name}\n\
             Amount: R{amount}\n\
             Receipt Number: {receipt_number}\n\n{SIGN_OFF}"
        ),
        kind: MessageKind::Receipt,
    }
}

pub fn feedback_response(to: &str, student_name: &str, response: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Response to Your Feedback - DriveHub".to_string(),
        body: format!(
            "Dear {student_name},\n\n\
             Thank you for your feedback. Here is our response:\n\n{response}\n\n{SIGN_OFF}"
        ),
        kind: MessageKind::FeedbackResponse,
    }
}

pub fn instructor_message(
    to: &str,
    student_name: &str,
    instructor_name: &str,
    subject: &str,
    content: &str,
) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        body: format!(
            "Dear {student_name},\n\n\
             Message from your instructor ({instructor_name}):\n\n{content}\n\n{SIGN_OFF}"
        ),
        kind: MessageKind::InstructorMessage,
    }
}
